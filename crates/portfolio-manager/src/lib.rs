pub mod db;
pub mod portfolio;
pub mod repository;

pub use db::PortfolioDb;
pub use portfolio::SqlitePortfolioRepository;
pub use repository::{create_portfolio_repository, RepositoryConfig, RepositoryKind};
