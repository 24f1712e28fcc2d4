pub mod address;
pub mod digest;
pub mod email;
pub mod listings;
pub mod mls;
pub mod odata;
