use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::{Availability, CandidateProduct};
use crate::utils::error::{AppError, Result};

/// Parsed output of one listing page. Malformed cards are skipped and
/// counted, never fatal to the page.
#[derive(Debug, Default)]
pub struct PageExtract {
    pub products: Vec<CandidateProduct>,
    pub skipped: usize,
}

/// Turns listing-page markup into candidate records. Bound to the card
/// shape of the catalog site: `.product-layout` cards with itemprop
/// metadata, `.price-new`/`.price-old` spans and a `.cart a` buy button.
pub struct Extractor {
    origin: String,
    card: Selector,
    name: Selector,
    name_fallback: Selector,
    link: Selector,
    image: Selector,
    image_fallback: Selector,
    price_meta: Selector,
    price_new: Selector,
    price_old: Selector,
    buy_button: Selector,
}

impl Extractor {
    pub fn new(catalog_url: &str) -> Result<Self> {
        let origin = Url::parse(catalog_url)?.origin().ascii_serialization();

        Ok(Self {
            origin,
            card: parse_selector(".product-layout")?,
            name: parse_selector(r#"h4 a span[itemprop="name"]"#)?,
            name_fallback: parse_selector("h4 a")?,
            link: parse_selector("h4 a")?,
            image: parse_selector(r#"img[itemprop="image"]"#)?,
            image_fallback: parse_selector("img")?,
            price_meta: parse_selector(r#"meta[itemprop="price"]"#)?,
            price_new: parse_selector(".price-new")?,
            price_old: parse_selector(".price-old")?,
            buy_button: parse_selector(".cart a")?,
        })
    }

    /// Site origin (`scheme://host`), used for rewriting relative links.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn extract(&self, html: &str) -> PageExtract {
        let document = Html::parse_document(html);
        let mut out = PageExtract::default();

        for card in document.select(&self.card) {
            match self.extract_card(card) {
                Some(product) => out.products.push(product),
                None => out.skipped += 1,
            }
        }

        out
    }

    fn extract_card(&self, card: ElementRef) -> Option<CandidateProduct> {
        let name_elem = card
            .select(&self.name)
            .next()
            .or_else(|| card.select(&self.name_fallback).next())?;
        let name = element_text(name_elem);
        if name.is_empty() {
            return None;
        }

        let url = card
            .select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| self.absolutize(href))
            .unwrap_or_default();

        let image_url = card
            .select(&self.image)
            .next()
            .or_else(|| card.select(&self.image_fallback).next())
            .and_then(|img| img.value().attr("src"))
            .filter(|src| !src.is_empty())
            .map(|src| self.absolutize(src));

        let price = match card.select(&self.price_meta).next() {
            Some(meta) => meta
                .value()
                .attr("content")
                .and_then(|content| content.parse::<f64>().ok())
                .unwrap_or(0.0),
            None => {
                let price_elem = card.select(&self.price_new).next()?;
                digit_run_value(&element_text(price_elem)).unwrap_or(0.0)
            }
        };
        if price <= 0.0 {
            return None;
        }

        let old_price = card
            .select(&self.price_old)
            .next()
            .and_then(|elem| digit_run_value(&element_text(elem)));

        let availability = if card.select(&self.buy_button).next().is_some() {
            Availability::Available
        } else {
            Availability::OutOfStock
        };

        Some(CandidateProduct {
            name,
            price,
            old_price,
            url,
            image_url,
            availability,
        })
    }

    fn absolutize(&self, href: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", self.origin, href)
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| AppError::Parse(format!("Invalid CSS selector '{}': {:?}", selector, e)))
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// Concatenates all digit runs in a price string. The source site uses
/// no decimal places, so "1 299 руб." reads as 1299.
fn digit_run_value(text: &str) -> Option<f64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}
