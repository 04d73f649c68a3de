pub mod smeplug;
pub mod vtpass;

pub use smeplug::SmeplugProvider;
pub use vtpass::VtpassProvider;
