//! Product extraction from a category's listing page.
//!
//! Cards are read straight off the listing. Brand is resolved afterwards in a
//! second pass that visits each product page and returns to the listing.

use chrono::Utc;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use url::Url;

use super::normalize::{
    absolute_url, clean_brand, discount_percent, parse_price_pair, parse_rating,
    parse_review_count, squash_whitespace,
};
use super::types::{ListingSelectors, ListingTimeouts};
use crate::browser::{attribute_of, text_of, ElementHandle, PageDriver, WaitUntil};
use crate::error::{DriverError, ExtractionError};
use crate::models::{Category, Product, DEFAULT_AVAILABILITY, UNKNOWN_BRAND};
use crate::session::Session;

/// Fields read from one listing card, before brand resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductCard {
    pub title: String,
    pub product_link: Option<String>,
    pub image_url: Option<String>,
    pub availability: String,
    pub price: f64,
    pub original_price: f64,
    pub discount_percent: u8,
    pub rating: f64,
    pub reviews_count: u64,
}

impl ProductCard {
    fn into_product(self, category: &Category) -> Product {
        Product {
            category_id: category.id,
            category_name: category.name.clone(),
            title: self.title,
            brand: UNKNOWN_BRAND.to_string(),
            price: self.price,
            original_price: self.original_price,
            discount_percent: self.discount_percent,
            rating: self.rating,
            reviews_count: self.reviews_count,
            product_link: self.product_link,
            image_url: self.image_url,
            availability: self.availability,
            scraped_at: Utc::now(),
        }
    }
}

pub struct ListingExtractor {
    base_url: Url,
    selectors: ListingSelectors,
    timeouts: ListingTimeouts,
    span: Span,
}

impl ListingExtractor {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            selectors: ListingSelectors::default(),
            timeouts: ListingTimeouts::default(),
            span: info_span!("listing"),
        }
    }

    #[must_use]
    pub fn with_selectors(mut self, selectors: ListingSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: ListingTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Extract up to `max_products` products from `category`'s listing page.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] only when the listing page itself cannot be
    /// loaded. A missing results marker is an empty listing, and card or brand
    /// failures are logged and skipped.
    pub async fn extract(
        &self,
        session: &Session,
        category: &Category,
        max_products: usize,
    ) -> Result<Vec<Product>, DriverError> {
        self.run(session, category, max_products)
            .instrument(self.span.clone())
            .await
    }

    async fn run(
        &self,
        session: &Session,
        category: &Category,
        max_products: usize,
    ) -> Result<Vec<Product>, DriverError> {
        let driver = session.driver();
        info!(category = %category.name, url = %category.url, "Scraping products");
        driver
            .navigate(&category.url, WaitUntil::Load, self.timeouts.listing_load)
            .await?;
        session.wait(2.0, 5.0).await;

        match driver
            .wait_for_selector(&self.selectors.result, self.timeouts.results)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                warn!(category = %category.name, "No product results found");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        }

        let cards = driver
            .query_selector_all(None, &self.selectors.result)
            .await?;
        info!(count = cards.len(), "Found product cards");

        let mut products = Vec::new();
        for (index, card) in cards.iter().take(max_products).enumerate() {
            match self.extract_card(driver, index, card).await {
                Ok(card) => {
                    debug!(title = %card.title, "Extracted product");
                    products.push(card.into_product(category));
                }
                Err(e @ ExtractionError::MissingTitle { .. }) => {
                    debug!(error = %e, "Skipping card");
                }
                Err(e) => warn!(error = %e, "Failed to extract product"),
            }
        }

        let listing_url = match driver.current_url().await {
            Ok(url) if !url.is_empty() => url,
            _ => category.url.clone(),
        };
        self.resolve_brands(session, &listing_url, &mut products).await;

        info!(
            category = %category.name,
            count = products.len(),
            "Extracted products"
        );
        Ok(products)
    }

    /// Read one card. A card without a title is not a product.
    pub async fn extract_card(
        &self,
        driver: &dyn PageDriver,
        index: usize,
        card: &ElementHandle,
    ) -> Result<ProductCard, ExtractionError> {
        self.read_card(driver, card)
            .await
            .map_err(|source| ExtractionError::Driver { index, source })?
            .ok_or(ExtractionError::MissingTitle { index })
    }

    async fn read_card(
        &self,
        driver: &dyn PageDriver,
        card: &ElementHandle,
    ) -> Result<Option<ProductCard>, DriverError> {
        let s = &self.selectors;
        let Some(title) = text_of(driver, card, &s.title).await? else {
            return Ok(None);
        };
        let title = squash_whitespace(&title);
        if title.is_empty() {
            return Ok(None);
        }

        let product_link = attribute_of(driver, card, &s.link, "href")
            .await?
            .and_then(|href| absolute_url(&self.base_url, &href));
        let image_url = attribute_of(driver, card, &s.image, "src").await?;
        let availability = text_of(driver, card, &s.availability)
            .await?
            .unwrap_or_else(|| DEFAULT_AVAILABILITY.to_string());

        let current = text_of(driver, card, &s.price).await?;
        let original = text_of(driver, card, &s.original_price).await?;
        let (price, original_price) = parse_price_pair(current.as_deref(), original.as_deref());

        let rating = text_of(driver, card, &s.rating)
            .await?
            .map_or(0.0, |text| parse_rating(&text));
        let reviews_count = text_of(driver, card, &s.reviews)
            .await?
            .map_or(0, |text| parse_review_count(&text));

        Ok(Some(ProductCard {
            title,
            product_link,
            image_url,
            availability,
            price,
            original_price,
            discount_percent: discount_percent(price, original_price),
            rating,
            reviews_count,
        }))
    }

    /// Visit each product page for its byline, returning to `listing_url`
    /// after every visit.
    async fn resolve_brands(
        &self,
        session: &Session,
        listing_url: &str,
        products: &mut [Product],
    ) {
        let driver = session.driver();
        for product in products.iter_mut() {
            let Some(link) = product.product_link.clone() else {
                continue;
            };
            product.brand = match self.read_brand(session, &link).await {
                Ok(brand) => brand,
                Err(e) => {
                    debug!(title = %product.title, error = %e, "Could not resolve brand");
                    UNKNOWN_BRAND.to_string()
                }
            };

            if let Err(e) = driver
                .navigate(listing_url, WaitUntil::DomContentLoaded, self.timeouts.back_to_listing)
                .await
            {
                warn!(error = %e, "Could not return to listing");
            }
            session.wait(1.0, 2.0).await;
        }
    }

    async fn read_brand(&self, session: &Session, link: &str) -> Result<String, DriverError> {
        let driver = session.driver();
        driver
            .navigate(link, WaitUntil::DomContentLoaded, self.timeouts.product_page)
            .await?;
        session.wait(2.0, 3.0).await;
        let byline = match driver.query_selector(None, &self.selectors.byline).await? {
            Some(byline) => driver.text_content(&byline).await?,
            None => String::new(),
        };
        Ok(clean_brand(&byline))
    }
}

#[cfg(test)]
#[path = "listing_test.rs"]
mod tests;
