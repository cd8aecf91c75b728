//! Persistence seam replacing a direct database binding: narrow
//! repository traits for the two lifecycle aggregates, plus an
//! in-memory reference implementation of each for tests and the CLI
//! demo binary. The registry store (C2) and health store (C10) own
//! their own repositories in `lib/registry` and `lib/health`
//! respectively, since both are first-class spec components.

pub mod deployment_store;
pub mod product_store;

pub use deployment_store::{DeploymentStore, InMemoryDeploymentStore};
pub use product_store::{InMemoryProductStore, ProductStore};
