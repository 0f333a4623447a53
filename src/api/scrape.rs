// ============================================================================
// Scraping : un nombre extrait d'une page HTML
// ============================================================================
// La page est parsée avec scraper (html5ever : entités décodées, HTML mal
// formé toléré). On garde le texte visible du premier élément qui
// correspond au sélecteur CSS (ou de toute la page), puis une regex
// capture le nombre voulu. Les pages changent souvent de structure :
// chaque échec est une FetchError, jamais un panic.
// ============================================================================

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use super::{FetchError, SourceClient};
use crate::models::Value;

/// Éléments dont le contenu n'est pas du texte affiché
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Récupère la page et en extrait un nombre
#[instrument(skip(client, pattern))]
pub async fn scrape_number(
    client: &SourceClient,
    url: &str,
    pattern: &str,
    selector: Option<&str>,
    average: bool,
) -> Result<Value, FetchError> {
    // Compile avant la requête : une regex invalide n'a pas besoin du réseau
    let regex = Regex::new(pattern).map_err(|e| FetchError::Parse(e.to_string()))?;

    let html = client.get_text(url).await?;
    let text = page_text(&html, selector)?;
    debug!(chars = text.len(), "Extracted page text");

    extract_number(&text, &regex, average).map(Value::scalar)
}

/// Texte visible d'une page HTML, espaces fusionnés
///
/// Avec un sélecteur : texte du premier élément correspondant
/// (MissingData s'il n'y en a aucun).
pub fn page_text(html: &str, selector: Option<&str>) -> Result<String, FetchError> {
    let document = Html::parse_document(html);

    let root = match selector {
        Some(raw) => {
            let selector = Selector::parse(raw)
                .map_err(|e| FetchError::Parse(format!("invalid selector '{}': {}", raw, e)))?;
            document
                .select(&selector)
                .next()
                .ok_or_else(|| FetchError::MissingData(format!("no element matches '{}'", raw)))?
        }
        None => document.root_element(),
    };

    Ok(visible_text(root))
}

fn visible_text(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| HIDDEN_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if !hidden {
            parts.push(&**text);
        }
    }

    parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extrait le nombre du premier match
///
/// - `average = false` : groupe 1 (ou tout le match sans groupe)
/// - `average = true` : moyenne de tous les décimaux du match (ex: une
///   fourchette "2.8% to 3.4%" donne 3.1)
pub fn extract_number(text: &str, regex: &Regex, average: bool) -> Result<f64, FetchError> {
    let captures = regex
        .captures(text)
        .ok_or_else(|| FetchError::MissingData(format!("pattern not found: {}", regex.as_str())))?;

    let matched = captures
        .get(1)
        .or_else(|| captures.get(0))
        .map(|m| m.as_str())
        .unwrap_or_default();

    if average {
        let numbers: Vec<f64> = decimals(matched);
        if numbers.is_empty() {
            return Err(FetchError::Parse(format!("no decimal in '{}'", matched)));
        }
        return Ok(numbers.iter().sum::<f64>() / numbers.len() as f64);
    }

    parse_number(matched)?.ok_or_else(|| FetchError::MissingData(format!("'{}' is not available", matched)))
}

/// Tous les nombres décimaux d'un texte
fn decimals(text: &str) -> Vec<f64> {
    Regex::new(r"\d+\.\d+")
        .map(|re| {
            re.find_iter(text)
                .filter_map(|m| m.as_str().parse::<f64>().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Parse "1,234.5", "4.33%", "n.a." (→ None)
pub fn parse_number(raw: &str) -> Result<Option<f64>, FetchError> {
    let cleaned = raw.trim().trim_end_matches('%').replace(',', "");
    let cleaned = cleaned.trim();

    if cleaned.eq_ignore_ascii_case("n.a.") || cleaned.eq_ignore_ascii_case("na") || cleaned.is_empty() {
        return Ok(None);
    }

    cleaned
        .parse::<f64>()
        .map(Some)
        .map_err(|_| FetchError::Parse(format!("'{}' is not a number", raw.trim())))
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><style>.x{color:red}</style><script>var a = "30";</script></head>
        <body><p>Updated &quot;daily&quot;&#160;&#x2014; rate &#x25;</p>
        <div id="current"><b>Current S&amp;P 500 PE Ratio:</b>&nbsp;30.03</div></body></html>"#;

    #[test]
    fn test_page_text() {
        assert_eq!(
            page_text(PAGE, None).unwrap(),
            "Updated \"daily\" \u{2014} rate % Current S&P 500 PE Ratio: 30.03"
        );
    }

    #[test]
    fn test_page_text_with_selector() {
        assert_eq!(
            page_text(PAGE, Some("#current")).unwrap(),
            "Current S&P 500 PE Ratio: 30.03"
        );
        assert!(matches!(page_text(PAGE, Some("span.powerIndex")), Err(FetchError::MissingData(_))));
        assert!(matches!(page_text(PAGE, Some("[[")), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_extract_capture_group() {
        let regex = Regex::new(r"PE Ratio: ([\d.,]+)").unwrap();
        let value = extract_number("Current S&P 500 PE Ratio: 30.03 +0.01", &regex, false).unwrap();
        assert_eq!(value, 30.03);
    }

    #[test]
    fn test_extract_average_of_range() {
        let regex = Regex::new(r"(?i)high-yield.*?default rate.*?\d+\.\d+%.*?\d+\.\d+%").unwrap();
        let text = "We expect the high-yield default rate to fall between 2.8% and 3.4% by year end";
        let value = extract_number(text, &regex, true).unwrap();
        assert!((value - 3.1).abs() < 1e-9);
    }

    #[test]
    fn test_pattern_not_found() {
        let regex = Regex::new(r"powerIndex ([\d.]+)").unwrap();
        let result = extract_number("nothing here", &regex, false);
        assert!(matches!(result, Err(FetchError::MissingData(_))));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1,234.5").unwrap(), Some(1234.5));
        assert_eq!(parse_number(" 4.33% ").unwrap(), Some(4.33));
        assert_eq!(parse_number("n.a.").unwrap(), None);
        assert!(parse_number("abc").is_err());
    }

    #[test]
    fn test_na_cell_is_missing_data() {
        let regex = Regex::new(r"Federal funds \(effective\) ([\w.]+)").unwrap();
        let result = extract_number("Federal funds (effective) n.a.", &regex, false);
        assert!(matches!(result, Err(FetchError::MissingData(_))));
    }
}
