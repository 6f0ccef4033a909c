#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map feed server binary.
//!
//! Runs non-interactively with `BIND_ADDR`/`PORT` from the environment,
//! or prompts for them when started with `--interactive`.

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if std::env::args().skip(1).any(|a| a == "--interactive") {
        return mozzi_server::interactive::run().await;
    }
    mozzi_server::run_server().await
}
