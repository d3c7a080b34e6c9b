//! Line items requested from the fundamentals-timeseries endpoint.
//!
//! Each key is prefixed with `quarterly` or `annual` on the wire and
//! humanized into a column name on the way back.

pub const INCOME_KEYS: &[&str] = &[
    "TotalRevenue",
    "CostOfRevenue",
    "GrossProfit",
    "OperatingExpense",
    "OperatingIncome",
    "ResearchAndDevelopment",
    "SellingGeneralAndAdministration",
    "InterestExpense",
    "PretaxIncome",
    "TaxProvision",
    "NetIncome",
    "BasicEPS",
    "DilutedEPS",
    "EBIT",
    "EBITDA",
    "DilutedAverageShares",
];

pub const BALANCE_SHEET_KEYS: &[&str] = &[
    "TotalAssets",
    "CurrentAssets",
    "CashAndCashEquivalents",
    "Inventory",
    "Receivables",
    "NetPPE",
    "Goodwill",
    "TotalLiabilitiesNetMinorityInterest",
    "CurrentLiabilities",
    "LongTermDebt",
    "TotalDebt",
    "StockholdersEquity",
    "RetainedEarnings",
    "WorkingCapital",
    "OrdinarySharesNumber",
];

pub const CASH_FLOW_KEYS: &[&str] = &[
    "OperatingCashFlow",
    "InvestingCashFlow",
    "FinancingCashFlow",
    "CapitalExpenditure",
    "FreeCashFlow",
    "DepreciationAndAmortization",
    "StockBasedCompensation",
    "CashDividendsPaid",
    "RepurchaseOfCapitalStock",
    "NetIncomeFromContinuingOperations",
    "EndCashPosition",
    "ChangeInWorkingCapital",
];

/// Comma-separated `type` parameter for one statement.
pub fn timeseries_types(prefix: &str, keys: &[&str]) -> String {
    keys.iter()
        .map(|k| format!("{}{}", prefix, k))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeseries_types() {
        assert_eq!(
            timeseries_types("annual", &["TotalRevenue", "NetIncome"]),
            "annualTotalRevenue,annualNetIncome"
        );
    }

    #[test]
    fn test_statement_keys_do_not_repeat() {
        for keys in [INCOME_KEYS, BALANCE_SHEET_KEYS, CASH_FLOW_KEYS] {
            let unique: std::collections::HashSet<_> = keys.iter().collect();
            assert_eq!(unique.len(), keys.len());
        }
    }
}
