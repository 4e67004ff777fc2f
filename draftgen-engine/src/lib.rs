pub mod assembler;
pub mod context_image;
pub mod errors;
pub mod geo;
pub mod importer;
pub mod layouts;
pub mod provider;
pub mod record;
pub mod substitute;
pub mod viewport;
