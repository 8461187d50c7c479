mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod identity;
    pub mod permissions;
}
mod api {
    pub mod routes;
}
mod media {
    pub mod store;
}
mod constants;

pub use api::routes::*;
pub use authentication::*;
pub use constants::*;
pub use database::*;
pub use media::store::*;
