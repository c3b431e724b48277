//! API clients for market and news data

pub mod news;
pub mod yahoo;

pub use news::NewsApiClient;
pub use yahoo::YahooFinanceClient;
