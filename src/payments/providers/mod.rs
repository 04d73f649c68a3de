pub mod paystack;

pub use paystack::PaystackProvider;
