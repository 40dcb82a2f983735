pub mod export;
pub mod load;
pub mod non_finite;
