//! Correlation ID codec.
//!
//! The market-data vendor addresses securities with one overloaded string, the
//! Correlation ID. Three shapes occur in practice:
//!
//! | Shape | Example | ISIN |
//! |-------|---------|------|
//! | Suffixed | `FR0014006ZC4@BGN Corp`, `G Z2 Comdty` | `FR0014006ZC4`, `G Z2` |
//! | CDS | `CY349216_271220` | `CY349216` |
//! | Bare | `FR0014006ZC4` | unchanged |
//!
//! [`CorrelationId::parse`] tries the shapes in that order and never fails:
//! anything unrecognised is taken to be an ISIN already. [`encode`] goes the
//! other way from the business security type.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Portfolio reported for strategy codes without a `_TRS…` suffix.
pub const MAIN_PORTFOLIO: &str = "MAIN";

static SUFFIXED: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"^(?P<isin>\w(?:[\w ]*\w)?)(?:@(?P<pricing_source>[A-Za-z0-9]+))?\s+(?P<suffix>Comdty|Corp|Govt|Equity|Curncy|Index)$",
    )
});

static CDS: LazyLock<Regex> = LazyLock::new(|| compile(r"^(?P<code>\w+)_(?P<info>\w+)$"));

static ISIN: LazyLock<Regex> = LazyLock::new(|| compile(r"^\w(?:[\w ]*\w)?$"));

static PRICING_SOURCE: LazyLock<Regex> = LazyLock::new(|| compile(r"^[A-Za-z0-9]+$"));

static STRATEGY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(?P<book>.+?)_(?P<portfolio>TRS[A-Za-z0-9]*)$"));

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(error) => unreachable!("built-in pattern {pattern:?} must compile: {error}"),
    }
}

/// Vendor yellow-key suffix closing a Correlation ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VendorSuffix {
    Comdty,
    Corp,
    Govt,
    Equity,
    Curncy,
    Index,
}

impl VendorSuffix {
    pub const ALL: [Self; 6] = [
        Self::Comdty,
        Self::Corp,
        Self::Govt,
        Self::Equity,
        Self::Curncy,
        Self::Index,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Comdty => "Comdty",
            Self::Corp => "Corp",
            Self::Govt => "Govt",
            Self::Equity => "Equity",
            Self::Curncy => "Curncy",
            Self::Index => "Index",
        }
    }
}

impl Display for VendorSuffix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorSuffix {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|suffix| suffix.as_str() == value)
            .ok_or(())
    }
}

/// Business classification of an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SecurityType {
    BondCorporate,
    Future,
    BondSovereign,
    CreditDefaultSwap,
    CdsIndexSwap,
    /// Any type without a vendor suffix; kept verbatim.
    Other(String),
}

impl SecurityType {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "Bond Corporate" => Self::BondCorporate,
            "Future" => Self::Future,
            "Bond Sovereign" => Self::BondSovereign,
            "Credit Default Swap" => Self::CreditDefaultSwap,
            "CDS Index Swap" => Self::CdsIndexSwap,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::BondCorporate => "Bond Corporate",
            Self::Future => "Future",
            Self::BondSovereign => "Bond Sovereign",
            Self::CreditDefaultSwap => "Credit Default Swap",
            Self::CdsIndexSwap => "CDS Index Swap",
            Self::Other(value) => value,
        }
    }

    pub const fn vendor_suffix(&self) -> Option<VendorSuffix> {
        match self {
            Self::BondCorporate => Some(VendorSuffix::Corp),
            Self::Future => Some(VendorSuffix::Comdty),
            Self::BondSovereign => Some(VendorSuffix::Govt),
            Self::CreditDefaultSwap | Self::CdsIndexSwap => Some(VendorSuffix::Curncy),
            Self::Other(_) => None,
        }
    }
}

impl Display for SecurityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs that cannot be turned into a Correlation ID.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierConstructionError {
    #[error("isin is missing")]
    MissingIsin,
    #[error("isin '{isin}' must be word characters with inner spaces only")]
    MalformedIsin { isin: String },
    #[error("security type is missing")]
    MissingSecurityType,
    #[error("pricing source '{pricing_source}' must be alphanumeric")]
    MalformedPricingSource { pricing_source: String },
}

/// A Correlation ID split into its logical parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationId {
    /// `<isin>[@<pricing_source>] <suffix>`
    Suffixed {
        isin: String,
        pricing_source: Option<String>,
        suffix: VendorSuffix,
    },
    /// `<code>_<info>`, the CDS shape; `code` is the ISIN.
    Cds { code: String, info: String },
    /// Anything else, taken to be an ISIN already.
    Bare(String),
}

type Matcher = fn(&str) -> Option<CorrelationId>;

/// Recognised shapes, in the order they are tried.
const MATCHERS: [Matcher; 2] = [match_suffixed, match_cds];

fn match_suffixed(input: &str) -> Option<CorrelationId> {
    let captures = SUFFIXED.captures(input)?;
    let suffix = captures.name("suffix")?.as_str().parse().ok()?;
    Some(CorrelationId::Suffixed {
        isin: captures.name("isin")?.as_str().to_string(),
        pricing_source: captures
            .name("pricing_source")
            .map(|value| value.as_str().to_string()),
        suffix,
    })
}

fn match_cds(input: &str) -> Option<CorrelationId> {
    let captures = CDS.captures(input)?;
    Some(CorrelationId::Cds {
        code: captures.name("code")?.as_str().to_string(),
        info: captures.name("info")?.as_str().to_string(),
    })
}

impl CorrelationId {
    /// Recognise `input`, falling back to [`CorrelationId::Bare`].
    pub fn parse(input: &str) -> Self {
        MATCHERS
            .iter()
            .find_map(|matcher| matcher(input))
            .unwrap_or_else(|| {
                tracing::debug!(identifier = input, "unrecognised correlation id; passing through");
                Self::Bare(input.to_string())
            })
    }

    /// Build the vendor identifier for a business security.
    ///
    /// The pricing source is only kept for `Bond Corporate`, and only when
    /// `ignore_pricing_source` is false. Types without a vendor suffix yield
    /// the bare ISIN.
    pub fn build(
        isin: &str,
        security_type: &SecurityType,
        pricing_source: Option<&str>,
        ignore_pricing_source: bool,
    ) -> Result<Self, IdentifierConstructionError> {
        validate_isin(isin)?;
        if security_type.as_str().trim().is_empty() {
            return Err(IdentifierConstructionError::MissingSecurityType);
        }

        let Some(suffix) = security_type.vendor_suffix() else {
            return Ok(Self::Bare(isin.to_string()));
        };

        let pricing_source = match (security_type, ignore_pricing_source) {
            (SecurityType::BondCorporate, false) => pricing_source
                .filter(|source| !source.trim().is_empty())
                .map(validate_pricing_source)
                .transpose()?,
            _ => None,
        };

        Ok(Self::Suffixed {
            isin: isin.to_string(),
            pricing_source,
            suffix,
        })
    }

    pub fn isin(&self) -> &str {
        match self {
            Self::Suffixed { isin, .. } => isin,
            Self::Cds { code, .. } => code,
            Self::Bare(isin) => isin,
        }
    }

    pub fn pricing_source(&self) -> Option<&str> {
        match self {
            Self::Suffixed { pricing_source, .. } => pricing_source.as_deref(),
            _ => None,
        }
    }

    pub const fn suffix(&self) -> Option<VendorSuffix> {
        match self {
            Self::Suffixed { suffix, .. } => Some(*suffix),
            _ => None,
        }
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Suffixed {
                isin,
                pricing_source: Some(source),
                suffix,
            } => write!(f, "{isin}@{source} {suffix}"),
            Self::Suffixed {
                isin,
                pricing_source: None,
                suffix,
            } => write!(f, "{isin} {suffix}"),
            Self::Cds { code, info } => write!(f, "{code}_{info}"),
            Self::Bare(isin) => f.write_str(isin),
        }
    }
}

fn validate_isin(isin: &str) -> Result<(), IdentifierConstructionError> {
    if isin.trim().is_empty() {
        return Err(IdentifierConstructionError::MissingIsin);
    }
    if !ISIN.is_match(isin) {
        return Err(IdentifierConstructionError::MalformedIsin {
            isin: isin.to_string(),
        });
    }
    Ok(())
}

fn validate_pricing_source(source: &str) -> Result<String, IdentifierConstructionError> {
    if PRICING_SOURCE.is_match(source) {
        Ok(source.to_string())
    } else {
        Err(IdentifierConstructionError::MalformedPricingSource {
            pricing_source: source.to_string(),
        })
    }
}

/// ISIN carried by a Correlation ID; unrecognised input comes back unchanged.
pub fn decode(identifier: &str) -> String {
    CorrelationId::parse(identifier).isin().to_string()
}

/// Correlation ID for `isin` given its business `security_type`.
pub fn encode(
    isin: &str,
    security_type: &str,
    pricing_source: Option<&str>,
    ignore_pricing_source: bool,
) -> Result<String, IdentifierConstructionError> {
    let security_type = SecurityType::parse(security_type);
    CorrelationId::build(isin, &security_type, pricing_source, ignore_pricing_source)
        .map(|id| id.to_string())
}

/// Portfolio of a `<book>[_<portfolio>]` strategy code, or [`MAIN_PORTFOLIO`]
/// unless the code ends in a `_TRS…` segment.
pub fn derive_portfolio(strategy_code: &str) -> String {
    STRATEGY
        .captures(strategy_code)
        .and_then(|captures| captures.name("portfolio"))
        .map_or_else(|| MAIN_PORTFOLIO.to_string(), |m| m.as_str().to_string())
}
