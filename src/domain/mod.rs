pub mod bucket;
pub mod factors;
pub mod record;
pub mod sensor;
