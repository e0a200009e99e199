//! Behavior-driven tests for Correlation ID handling
//!
//! These tests verify HOW vendor identifiers are decoded to ISINs, how ISINs
//! are encoded back for a security type, and how strategy codes map to
//! portfolios.

use pnlbot_core::{
    decode, derive_portfolio, encode, CorrelationId, IdentifierConstructionError, VendorSuffix,
    MAIN_PORTFOLIO,
};

// =============================================================================
// Decode: vendor shapes
// =============================================================================

#[test]
fn when_identifier_carries_a_vendor_suffix_decode_returns_the_isin() {
    // Given: Identifiers as the vendor sends them
    let cases = [
        ("ITXEX538  Curncy", "ITXEX538"),
        ("FR0014006ZC4@BGN Corp", "FR0014006ZC4"),
        ("G Z2 Comdty", "G Z2"),
        ("ITRX XOVER CDSI GEN 5Y Corp", "ITRX XOVER CDSI GEN 5Y"),
        ("GECU10Y Index", "GECU10Y"),
        ("GB00BDCHBW80 Govt", "GB00BDCHBW80"),
        ("US0378331005 Equity", "US0378331005"),
    ];

    for (identifier, isin) in cases {
        // When: The identifier is decoded
        let decoded = decode(identifier);

        // Then: Only the ISIN remains
        assert_eq!(decoded, isin, "decoding {identifier}");
    }
}

#[test]
fn when_identifier_has_cds_shape_decode_keeps_the_code() {
    // Given: A CDS identifier made of a code and a maturity
    let identifier = "CY349216_271220";

    // When: It is decoded
    let decoded = decode(identifier);

    // Then: The part before the underscore is the ISIN
    assert_eq!(decoded, "CY349216");
}

#[test]
fn when_identifier_is_unrecognised_decode_passes_it_through() {
    // Given: Input that is already an ISIN or is not a vendor shape at all
    for identifier in ["FR0014006ZC4", "", "ABC corp", "X-Y Corp", "ABC@ Corp"] {
        // When: It is decoded
        let decoded = decode(identifier);

        // Then: Nothing is stripped and nothing fails
        assert_eq!(decoded, identifier);
    }
}

#[test]
fn when_identifier_is_parsed_its_parts_are_available() {
    // Given: A corporate bond identifier with a pricing source
    let parsed = CorrelationId::parse("FR0014006ZC4@BGN Corp");

    // Then: Each logical part can be read back
    assert_eq!(parsed.isin(), "FR0014006ZC4");
    assert_eq!(parsed.pricing_source(), Some("BGN"));
    assert_eq!(parsed.suffix(), Some(VendorSuffix::Corp));
}

// =============================================================================
// Encode: security type mapping
// =============================================================================

#[test]
fn when_encoding_a_corporate_bond_the_pricing_source_is_kept() {
    // Given: A corporate bond priced on BGN

    // When: It is encoded
    let encoded = encode("FR0014006ZC4", "Bond Corporate", Some("BGN"), false).expect("encode");

    // Then: The pricing source sits between ISIN and suffix
    assert_eq!(encoded, "FR0014006ZC4@BGN Corp");
}

#[test]
fn when_encoding_other_mapped_types_the_pricing_source_is_dropped() {
    // Given: Mapped security types other than corporate bonds
    let sovereign = encode("GB00BDCHBW80", "Bond Sovereign", Some("BGN"), false).expect("encode");
    let future = encode("G Z2", "Future", Some("BGN"), false).expect("encode");
    let cds = encode("ITXEX538", "Credit Default Swap", Some("BGN"), false).expect("encode");

    // Then: Only the vendor suffix is appended
    assert_eq!(sovereign, "GB00BDCHBW80 Govt");
    assert_eq!(future, "G Z2 Comdty");
    assert_eq!(cds, "ITXEX538 Curncy");
}

#[test]
fn when_pricing_source_is_ignored_corporate_bonds_get_plain_suffix() {
    // Given: A caller that explicitly ignores the pricing source
    let encoded = encode("FR0014006ZC4", "Bond Corporate", Some("BGN"), true).expect("encode");

    // Then: No pricing source is emitted
    assert_eq!(encoded, "FR0014006ZC4 Corp");
}

#[test]
fn when_security_type_is_unmapped_encode_returns_the_isin_unchanged() {
    // Given: Types the vendor mapping does not know
    for security_type in ["Equity Common", "Repo", "bond corporate", "FX Forward"] {
        for pricing_source in [None, Some("BGN"), Some("CBBT")] {
            // When: The ISIN is encoded
            let encoded =
                encode("XS0000000001", security_type, pricing_source, false).expect("encode");

            // Then: The ISIN is returned as is
            assert_eq!(encoded, "XS0000000001", "type {security_type}");
        }
    }
}

#[test]
fn encoded_corporate_bonds_decode_back_to_their_isin() {
    // Given: A spread of ISIN and pricing source shapes
    let isins = ["FR0014006ZC4", "G Z2", "XS1_2", "A"];
    let sources = ["BGN", "CBBT", "TRACE", "x1"];

    for isin in isins {
        for source in sources {
            // When: Encoded as a corporate bond and decoded again
            let encoded = encode(isin, "Bond Corporate", Some(source), false).expect("encode");

            // Then: The original ISIN comes back
            assert_eq!(decode(&encoded), isin, "via {encoded}");
        }
    }
}

// =============================================================================
// Encode: malformed input
// =============================================================================

#[test]
fn when_isin_is_missing_encode_fails() {
    // Given: Empty and blank ISINs
    for isin in ["", "   "] {
        // When: Encoding is attempted
        let error = encode(isin, "Future", None, false).expect_err("must fail");

        // Then: The error names the missing ISIN
        assert_eq!(error, IdentifierConstructionError::MissingIsin);
    }
}

#[test]
fn when_isin_contains_separators_encode_fails() {
    // Given: An ISIN that would corrupt the identifier grammar
    let error = encode("FR00@BGN", "Bond Corporate", None, false).expect_err("must fail");

    // Then: It is reported as malformed
    assert!(matches!(
        error,
        IdentifierConstructionError::MalformedIsin { ref isin } if isin == "FR00@BGN"
    ));
}

#[test]
fn when_security_type_is_empty_encode_fails() {
    let error = encode("FR0014006ZC4", "", None, false).expect_err("must fail");
    assert_eq!(error, IdentifierConstructionError::MissingSecurityType);
}

// =============================================================================
// Portfolio derivation
// =============================================================================

#[test]
fn when_strategy_code_ends_in_trs_segment_portfolio_is_that_segment() {
    assert_eq!(derive_portfolio("SEMINARA_TRSB"), "TRSB");
    assert_eq!(derive_portfolio("BOOK_TRS_TRSA"), "TRSA");
}

#[test]
fn when_strategy_code_has_no_trs_segment_portfolio_is_main() {
    for code in ["VOON", "SUB INC", "", "BOOK_CASH", "TRSB"] {
        assert_eq!(derive_portfolio(code), MAIN_PORTFOLIO, "code {code:?}");
    }
}
