pub mod app;
pub mod config;
pub mod error;
pub mod models {
    pub mod document;
    pub mod record;
    pub mod search;
    pub mod validation;
}
pub mod rendering {
    pub mod text;
}
pub mod search {
    pub mod client;
    pub mod codec;
    pub mod memory;
    pub mod query;
}
pub mod api {
    pub mod docs;
    pub mod errors;
    pub mod resources;
}
