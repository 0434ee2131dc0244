//! Listing-page extraction: catalog markup in, product candidates out.

use pricewatch_core::{ListingCandidate, MISSING_TITLE};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::warn;

pub const CRATE_NAME: &str = "pricewatch-extract";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },
}

/// CSS selectors and attribute names for one catalog theme.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub product: String,
    pub thumbnail: String,
    pub sale_amount: String,
    pub regular_amount: String,
    pub title_attr: String,
    pub image_attr: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            product: "ul.products .product".to_string(),
            thumbnail: "div.mf-product-thumbnail img".to_string(),
            sale_amount: "span.price ins .woocommerce-Price-amount".to_string(),
            regular_amount: "span.price .woocommerce-Price-amount bdi".to_string(),
            title_attr: "title".to_string(),
            image_attr: "data-lazy-src".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub selectors: ListingSelectors,
    pub currency_symbol: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            selectors: ListingSelectors::default(),
            currency_symbol: "₹".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Extractor {
    product: Selector,
    thumbnail: Selector,
    sale_amount: Selector,
    regular_amount: Selector,
    title_attr: String,
    image_attr: String,
    currency_symbol: String,
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, ExtractError> {
        let s = &config.selectors;
        Ok(Self {
            product: parse_selector(&s.product)?,
            thumbnail: parse_selector(&s.thumbnail)?,
            sale_amount: parse_selector(&s.sale_amount)?,
            regular_amount: parse_selector(&s.regular_amount)?,
            title_attr: s.title_attr.clone(),
            image_attr: s.image_attr.clone(),
            currency_symbol: config.currency_symbol,
        })
    }

    /// One candidate per listing node, in document order. Nodes without an
    /// image source are skipped.
    pub fn extract(&self, html: &str) -> Vec<ListingCandidate> {
        let document = Html::parse_document(html);
        document
            .select(&self.product)
            .enumerate()
            .filter_map(|(index, node)| self.extract_node(index, node))
            .collect()
    }

    fn extract_node(&self, index: usize, node: ElementRef<'_>) -> Option<ListingCandidate> {
        let thumbnail = node.select(&self.thumbnail).next();

        let title = thumbnail
            .and_then(|img| img.value().attr(&self.title_attr))
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| MISSING_TITLE.to_string());

        let Some(image_url) = thumbnail
            .and_then(|img| img.value().attr(&self.image_attr))
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            warn!(index, title = %title, attr = %self.image_attr, "listing node has no image source; skipping");
            return None;
        };

        let price = self.price_for(node, &title);
        Some(ListingCandidate {
            title,
            price,
            image_url: image_url.to_string(),
        })
    }

    /// Sale amount, then regular amount, then zero.
    fn price_for(&self, node: ElementRef<'_>, title: &str) -> f64 {
        for selector in [&self.sale_amount, &self.regular_amount] {
            let Some(element) = node.select(selector).next() else {
                continue;
            };
            let text = element.text().collect::<String>();
            match parse_amount(&text, &self.currency_symbol) {
                Some(price) => return price,
                None => warn!(title, text = %text.trim(), "unparseable price amount"),
            }
        }
        0.0
    }
}

/// Parses a display amount such as `₹1,299.00` after dropping the currency
/// symbol, thousands separators, and whitespace. Negative or non-finite values
/// are rejected.
pub fn parse_amount(text: &str, currency_symbol: &str) -> Option<f64> {
    let stripped = if currency_symbol.is_empty() {
        text.to_string()
    } else {
        text.replace(currency_symbol, "")
    };
    let cleaned: String = stripped
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn extractor() -> Extractor {
        Extractor::new(ExtractorConfig::default()).unwrap()
    }

    fn listing(items: &[&str]) -> String {
        format!(
            "<html><body><ul class=\"products\">{}</ul></body></html>",
            items.concat()
        )
    }

    fn item(thumbnail: &str, price: &str) -> String {
        format!(
            "<li class=\"product\"><div class=\"mf-product-thumbnail\">{thumbnail}</div><span class=\"price\">{price}</span></li>"
        )
    }

    fn amount(value: &str) -> String {
        format!(
            "<span class=\"woocommerce-Price-amount amount\"><bdi><span class=\"woocommerce-Price-currencySymbol\">&#8377;</span>{value}</bdi></span>"
        )
    }

    fn img(title: &str, src: &str) -> String {
        format!("<img title=\"{title}\" data-lazy-src=\"{src}\" src=\"placeholder.svg\">")
    }

    #[test]
    fn sale_price_wins_over_regular_price() {
        let html = listing(&[&item(
            &img("Copper Kettle", "https://cdn.example/kettle.jpg"),
            &format!("<del>{}</del> <ins>{}</ins>", amount("1,499.00"), amount("1,299.00")),
        )]);

        let candidates = extractor().extract(&html);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].price, 1299.0);
    }

    #[test]
    fn regular_price_is_used_without_sale() {
        let html = listing(&[&item(&img("Brass Lamp", "https://cdn.example/lamp.jpg"), &amount("499"))]);
        assert_eq!(extractor().extract(&html)[0].price, 499.0);
    }

    #[test]
    fn missing_price_is_zero() {
        let html = listing(&[&item(&img("Mystery Box", "https://cdn.example/box.jpg"), "")]);
        assert_eq!(extractor().extract(&html)[0].price, 0.0);
    }

    #[test]
    fn malformed_sale_amount_falls_back_to_regular() {
        let html = listing(&[&item(
            &img("Tea Set", "https://cdn.example/tea.jpg"),
            &format!(
                "<del>{}</del> <ins><span class=\"woocommerce-Price-amount\">call us</span></ins>",
                amount("2,100.00")
            ),
        )]);
        assert_eq!(extractor().extract(&html)[0].price, 2100.0);
    }

    #[test]
    fn title_is_trimmed_or_defaulted() {
        let html = listing(&[
            &item(&img("  Copper Kettle \n", "https://cdn.example/kettle.jpg"), &amount("10")),
            &item(
                "<img data-lazy-src=\"https://cdn.example/untitled.jpg\">",
                &amount("20"),
            ),
        ]);

        let candidates = extractor().extract(&html);

        assert_eq!(candidates[0].title, "Copper Kettle");
        assert_eq!(candidates[1].title, MISSING_TITLE);
    }

    #[test]
    fn nodes_without_image_source_are_skipped() {
        let html = listing(&[
            &item("<img title=\"No Picture\" src=\"x.jpg\">", &amount("10")),
            &item(&img("Brass Lamp", "https://cdn.example/lamp.jpg"), &amount("499")),
        ]);

        let candidates = extractor().extract(&html);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Brass Lamp");
        assert_eq!(candidates[0].image_url, "https://cdn.example/lamp.jpg");
    }

    #[test]
    fn page_without_listing_yields_nothing() {
        assert!(extractor().extract("<html><body><p>maintenance</p></body></html>").is_empty());
    }

    #[test]
    fn amount_parsing_strips_symbol_and_separators() {
        assert_eq!(parse_amount("₹1,299.00", "₹"), Some(1299.0));
        assert_eq!(parse_amount(" ₹ 12,34,567 ", "₹"), Some(1234567.0));
        assert_eq!(parse_amount("$5.50", "$"), Some(5.5));
        assert_eq!(parse_amount("free", "₹"), None);
        assert_eq!(parse_amount("-3", "₹"), None);
    }

    #[test]
    fn bad_selector_is_rejected() {
        let config = ExtractorConfig {
            selectors: ListingSelectors {
                product: "ul..[".to_string(),
                ..ListingSelectors::default()
            },
            ..ExtractorConfig::default()
        };
        assert!(matches!(Extractor::new(config), Err(ExtractError::Selector { .. })));
    }

    #[test]
    fn catalog_fixture_extracts_in_document_order() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/catalog/page1.html");
        let html = std::fs::read_to_string(path).unwrap();

        let candidates = extractor().extract(&html);
        let titles: Vec<_> = candidates.iter().map(|c| c.title.as_str()).collect();

        assert_eq!(titles, vec!["Copper Kettle", "Brass Diya Set", "Cotton Table Runner"]);
        assert_eq!(candidates[0].price, 1299.0);
        assert_eq!(candidates[1].price, 499.0);
        assert_eq!(candidates[2].price, 0.0);
    }
}
