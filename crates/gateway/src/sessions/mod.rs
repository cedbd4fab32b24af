pub mod pairing;
pub mod record;
pub mod registry;
