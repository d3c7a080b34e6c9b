use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use stock_core::StockError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Header names that hold the ticker, in order of preference.
pub const TICKER_COLUMNS: [&str; 5] = ["Symbol", "Ticker", "EPIC", "Code", "ISIN"];

/// A supported market index and where its constituents are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSource {
    pub name: &'static str,
    pub url: &'static str,
    /// Exchange suffix appended to every symbol, e.g. `L` for London.
    pub suffix: Option<&'static str>,
}

pub const INDICES: [IndexSource; 4] = [
    IndexSource {
        name: "SP500",
        url: "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies",
        suffix: None,
    },
    IndexSource {
        name: "IBEX35",
        url: "https://en.wikipedia.org/wiki/IBEX_35",
        suffix: None,
    },
    IndexSource {
        name: "FTSE100",
        url: "https://en.wikipedia.org/wiki/FTSE_100_Index",
        suffix: Some("L"),
    },
    IndexSource {
        name: "DAX",
        url: "https://en.wikipedia.org/wiki/DAX",
        suffix: None,
    },
];

pub fn find_index(name: &str) -> Option<&'static IndexSource> {
    INDICES.iter().find(|index| index.name == name)
}

/// Scrapes index constituents from Wikipedia.
#[derive(Clone)]
pub struct IndexListingService {
    client: Client,
}

impl IndexListingService {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    pub async fn get_index_listing(&self, index_name: &str) -> Result<Vec<String>, StockError> {
        let index = find_index(index_name)
            .ok_or_else(|| StockError::NotFound(format!("Index {} not supported", index_name)))?;

        tracing::info!("Fetching constituents of {} from {}", index.name, index.url);
        let response = self
            .client
            .get(index.url)
            .send()
            .await
            .map_err(|e| StockError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StockError::Upstream(format!(
                "{} returned {}",
                index.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StockError::Upstream(e.to_string()))?;

        let symbols = extract_symbols(&body, index.suffix)?;
        tracing::info!("Found {} constituents for {}", symbols.len(), index.name);
        Ok(symbols)
    }
}

fn selector(css: &str) -> Result<Selector, StockError> {
    Selector::parse(css).map_err(|e| StockError::Upstream(format!("Invalid selector {}: {:?}", css, e)))
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Pull the ticker column out of the first table that has one.
///
/// Tables are scanned in document order; within a table the header names in
/// [`TICKER_COLUMNS`] are tried in order.
pub fn extract_symbols(html: &str, suffix: Option<&str>) -> Result<Vec<String>, StockError> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let header_selector = selector("th")?;
    let cell_selector = selector("th, td")?;

    let tables: Vec<ElementRef> = document.select(&table_selector).collect();
    if tables.is_empty() {
        return Err(StockError::NoData("No tables found on the page".to_string()));
    }

    for table in tables {
        let mut rows = table.select(&row_selector);
        let Some(header_row) = rows.next() else {
            continue;
        };
        let headers: Vec<String> = header_row.select(&header_selector).map(|h| cell_text(&h)).collect();

        let Some(position) = TICKER_COLUMNS
            .iter()
            .find_map(|name| headers.iter().position(|h| h == name))
        else {
            continue;
        };

        let symbols: Vec<String> = rows
            .filter_map(|row| row.select(&cell_selector).nth(position))
            .map(|cell| cell_text(&cell))
            .filter(|text| !text.is_empty())
            .map(|text| match suffix {
                Some(suffix) => format!("{}.{}", text, suffix),
                None => text,
            })
            .collect();

        if !symbols.is_empty() {
            return Ok(symbols);
        }
    }

    Err(StockError::NoData("No ticker column found in any table on the page".to_string()))
}
