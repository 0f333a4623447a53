// ============================================================================
// Catalogue intégré des indicateurs
// ============================================================================
// Utilisé quand la config ne définit pas de [[indicators]].
// Les motifs de scraping portent sur le texte visible des pages
// (voir api::scrape::page_text), restreint au sélecteur CSS s'il y en a
// un ; ils cassent quand les sites changent.
// ============================================================================

use crate::models::{Category, Indicator, Source};

fn fred(series: &str) -> Source {
    Source::Fred { series: series.to_string() }
}

fn scrape(url: &str, pattern: &str) -> Source {
    Source::Scrape {
        url: url.to_string(),
        pattern: pattern.to_string(),
        selector: None,
        average: false,
    }
}

/// Indicateurs par défaut : risques, cycles de dette court/long terme, géo
pub fn default_indicators() -> Vec<Indicator> {
    use Category::*;

    vec![
        // Risques
        Indicator::new("Volatility Risk", Risk, Source::Quote { symbol: "^VIX".to_string() })
            .with_threshold(20.0)
            .with_unit("pts")
            .with_description("swings fog crash heart race scare"),
        Indicator::new(
            "Credit Risk",
            Risk,
            Source::Scrape {
                url: "https://www.moodys.com/web/en/us/insights/data-stories/us-corporate-default-risk-in-2025.html"
                    .to_string(),
                pattern: r"(?i)high-yield.{0,200}?default rate.{0,200}?\d+\.\d+%.{0,40}?\d+\.\d+%".to_string(),
                selector: None,
                average: true,
            },
        )
        .with_threshold(5.0)
        .with_unit("%")
        .with_description("defaults drought crop loans fail"),
        Indicator::new(
            "Interest Rate Risk",
            Risk,
            Source::Fallback {
                primary: Box::new(fred("FEDFUNDS")),
                secondary: Box::new(scrape(
                    "https://www.federalreserve.gov/releases/h15/",
                    r"(?i)Federal funds \(effective\)(?:\s+\d+)*(?:\s+[\d.]+)*\s+([\d.]+)",
                )),
            },
        )
        .with_threshold(5.0)
        .with_unit("%")
        .with_description("rises hurt bonds brakes slow car"),
        Indicator::new("TED Spread", Risk, fred("TEDRATE"))
            .with_threshold(0.5)
            .with_unit("%")
            .with_description("liquidity jam"),
        Indicator::new(
            "CPI Inflation",
            Risk,
            Source::FredChange { series: "CPIAUCSL".to_string(), periods: 12 },
        )
        .with_threshold(3.0)
        .with_unit("% y/y")
        .with_description("fire burn cash"),
        // Cycle de dette court terme
        Indicator::new("Yield Curve", ShortTermDebt, fred("T10Y2Y"))
            .with_threshold(0.0)
            .with_unit("%")
            .with_description("river spread bank profit growth"),
        Indicator::new("GDP", ShortTermDebt, fred("GDP"))
            .with_hint("rising is expansion")
            .with_unit("bn $")
            .with_description("harvest output jobs"),
        Indicator::new("Capacity Utilization", ShortTermDebt, fred("CAPUTLB50001S"))
            .with_unit("%")
            .with_description("factory hum no smoke"),
        Indicator::new(
            "PCE Inflation",
            ShortTermDebt,
            Source::FredChange { series: "PCEPI".to_string(), periods: 12 },
        )
        .with_unit("% y/y")
        .with_description("heat balloon"),
        Indicator::new("Payrolls", ShortTermDebt, fred("PAYEMS"))
            .with_unit("k jobs")
            .with_description("job adds team build"),
        Indicator::new("Unemployment", ShortTermDebt, fred("UNRATE"))
            .with_unit("%")
            .with_description("idle rust"),
        Indicator::new(
            "P/E Ratio",
            ShortTermDebt,
            Source::Scrape {
                url: "https://www.multpl.com/s-p-500-pe-ratio".to_string(),
                pattern: r"(?i)PE Ratio:?\s*([\d.,]+)".to_string(),
                selector: Some("#current".to_string()),
                average: false,
            },
        )
        .with_threshold(25.0)
        .with_unit("x")
        .with_description("overprice house"),
        Indicator::new("Fed Funds Rate", ShortTermDebt, fred("FEDFUNDS"))
            .with_unit("%")
            .with_description("borrow speed limit"),
        Indicator::new("Industrial Production", ShortTermDebt, fred("INDPRO"))
            .with_unit("index")
            .with_description("factory make"),
        // Cycle de dette long terme
        Indicator::new("Productivity", LongTermDebt, fred("OPHNFB"))
            .with_unit("index")
            .with_description("output/input tools boost"),
        Indicator::new(
            "Debt/GDP",
            LongTermDebt,
            // GFDEBTN est en millions, GDP en milliards
            Source::FredRatio {
                numerator: "GFDEBTN".to_string(),
                denominator: "GDP".to_string(),
                scale: 0.1,
            },
        )
        .with_unit("%")
        .with_description("borrow max cards burden"),
        Indicator::new("M2 Money Supply", LongTermDebt, fred("M2SL"))
            .with_unit("bn $")
            .with_description("printing rain money"),
        Indicator::new(
            "Asset Returns S&P",
            LongTermDebt,
            Source::QuoteHistory { symbol: "^GSPC".to_string() },
        )
        .with_unit("pts")
        .with_description("gains steady heal"),
        // Cycles géopolitiques
        Indicator::new(
            "GDP per Capita",
            Geo,
            Source::WorldBank {
                indicator: "NY.GDP.PCAP.CD".to_string(),
                country: "USA".to_string(),
            },
        )
        .with_unit("$")
        .with_description("income head living rise"),
        Indicator::new(
            "Military Spend",
            Geo,
            Source::WorldBank {
                indicator: "MS.MIL.XPND.GD.ZS".to_string(),
                country: "USA".to_string(),
            },
        )
        .with_unit("% GDP")
        .with_description("arms costly drain"),
        Indicator::new(
            "Power Index",
            Geo,
            scrape(
                "https://www.globalfirepower.com/countries-listing.php",
                r"(?i)United States.{0,200}?PwrIndx:?\s*([\d.]+)",
            ),
        )
        .with_hint("lower is stronger")
        .with_description("composite strength peak/drop"),
    ]
}
