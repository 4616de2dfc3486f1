pub mod amount;
