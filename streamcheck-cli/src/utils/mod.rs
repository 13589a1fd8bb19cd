mod params;

pub use params::{apply_headers, parse_params};
