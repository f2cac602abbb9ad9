use serde::{Deserialize, Serialize};

/// A transferable asset on one external platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub symbol: String,
    /// Token contract (EVM) or asset id / script hash (account chain).
    /// `None` for the platform's native coin on EVM chains.
    pub contract: Option<String>,
    /// Decimals on the external chain.
    pub decimals: u8,
    /// Decimals of the same token on the home chain.
    pub home_decimals: u8,
}

impl AssetInfo {
    pub fn native(symbol: &str, decimals: u8, home_decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            contract: None,
            decimals,
            home_decimals,
        }
    }

    pub fn token(symbol: &str, contract: &str, decimals: u8, home_decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            contract: Some(contract.to_string()),
            decimals,
            home_decimals,
        }
    }

    pub fn is_native(&self) -> bool {
        self.contract.is_none()
    }
}

/// Assets recognised on one platform, looked up by contract or symbol.
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    assets: Vec<AssetInfo>,
}

impl AssetTable {
    pub fn new(assets: Vec<AssetInfo>) -> Self {
        Self { assets }
    }

    pub fn by_contract(&self, contract: &str) -> Option<&AssetInfo> {
        let wanted = strip_hex_prefix(contract);
        self.assets.iter().find(|a| {
            a.contract
                .as_deref()
                .map(|c| strip_hex_prefix(c).eq_ignore_ascii_case(wanted))
                .unwrap_or(false)
        })
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&AssetInfo> {
        self.assets
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn native(&self) -> Option<&AssetInfo> {
        self.assets.iter().find(|a| a.is_native())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetInfo> {
        self.assets.iter()
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Fixed account-chain asset table: the two UTXO assets and the SOUL NEP-5
/// token, keyed by asset id / script hash.
pub fn neo_assets() -> AssetTable {
    AssetTable::new(vec![
        AssetInfo::token(
            "NEO",
            "c56f33fc6ecfcd0c225c4ab356fee59390af8560be0e930faebe74a6daff7c9b",
            0,
            0,
        ),
        AssetInfo::token(
            "GAS",
            "602c79718b16e442de58778e148d0b1084e3b2dffd5de6b7b16cee7969282de7",
            8,
            8,
        ),
        AssetInfo::token("SOUL", "ed07cffad18f1308db51920d99a2af60ac66a7b3", 8, 8),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_contract_ignores_prefix_and_case() {
        let table = AssetTable::new(vec![
            AssetInfo::native("ETH", 18, 18),
            AssetInfo::token("USDT", "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6, 6),
        ]);
        let usdt = table
            .by_contract("dac17f958d2ee523a2206206994597c13d831ec7")
            .unwrap();
        assert_eq!(usdt.symbol, "USDT");
        assert!(table.by_contract("0x0000000000000000000000000000000000000000").is_none());
        assert_eq!(table.native().unwrap().symbol, "ETH");
    }

    #[test]
    fn test_neo_table() {
        let table = neo_assets();
        assert_eq!(table.by_symbol("gas").unwrap().decimals, 8);
        assert_eq!(table.by_symbol("NEO").unwrap().decimals, 0);
        assert!(table.native().is_none());
        assert!(table
            .by_contract("0xed07cffad18f1308db51920d99a2af60ac66a7b3")
            .is_some());
    }
}
