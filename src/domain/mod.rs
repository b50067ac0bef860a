pub mod entities;
pub mod errors;
pub mod repositories;
pub mod services;
pub mod value_objects;

#[cfg(test)]
pub mod test_support;
