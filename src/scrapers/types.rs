use std::time::Duration;

/// CSS selectors for the hamburger category menu.
#[derive(Debug, Clone)]
pub struct MenuSelectors {
    pub hamburger: String,
    pub logo: String,
    /// Top-level department list.
    pub departments: String,
    /// Used when [`Self::departments`] is missing.
    pub departments_fallback: String,
    /// Scrollable menu container.
    pub menu_content: String,
    pub menu_item: String,
    pub back_button: String,
}

impl MenuSelectors {
    /// Section listing the subcategories of the department labelled `name`.
    #[must_use]
    pub fn category_section(&self, name: &str) -> String {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("section[aria-labelledby=\"{escaped}\"]")
    }
}

impl Default for MenuSelectors {
    fn default() -> Self {
        Self {
            hamburger: "#nav-hamburger-menu".to_string(),
            logo: "#nav-bb-logo".to_string(),
            departments: "section[aria-labelledby=\"Shop by Department\"]".to_string(),
            departments_fallback: "#hmenu-content".to_string(),
            menu_content: "#hmenu-content".to_string(),
            menu_item: "a.hmenu-item".to_string(),
            back_button: "a.hmenu-item.hmenu-back-button".to_string(),
        }
    }
}

/// CSS selectors for listing cards and product detail pages.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub result: String,
    pub title: String,
    pub link: String,
    pub image: String,
    pub price: String,
    pub original_price: String,
    pub rating: String,
    pub reviews: String,
    pub availability: String,
    pub byline: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            result: "[data-component-type='s-search-result']".to_string(),
            title: "a h2 span".to_string(),
            link: "a.a-link-normal".to_string(),
            image: ".s-image".to_string(),
            price: ".a-price .a-offscreen".to_string(),
            original_price: ".a-price.a-text-price .a-offscreen".to_string(),
            rating: ".a-icon-alt".to_string(),
            reviews: ".a-size-mini.puis-normal-weight-text.s-underline-text".to_string(),
            availability: ".a-size-base.a-color-price".to_string(),
            byline: "#bylineInfo".to_string(),
        }
    }
}

/// Bounded waits used while walking the menu.
#[derive(Debug, Clone, Copy)]
pub struct MenuTimeouts {
    pub home_load: Duration,
    pub hamburger: Duration,
    pub logo: Duration,
    pub menu_content: Duration,
    pub category_section: Duration,
    pub back: Duration,
    pub reload: Duration,
}

impl Default for MenuTimeouts {
    fn default() -> Self {
        Self {
            home_load: Duration::from_secs(60),
            hamburger: Duration::from_secs(10),
            logo: Duration::from_secs(5),
            menu_content: Duration::from_secs(15),
            category_section: Duration::from_secs(10),
            back: Duration::from_secs(8),
            reload: Duration::from_secs(60),
        }
    }
}

/// Bounded waits used while extracting listings.
#[derive(Debug, Clone, Copy)]
pub struct ListingTimeouts {
    pub listing_load: Duration,
    pub results: Duration,
    pub product_page: Duration,
    pub back_to_listing: Duration,
}

impl Default for ListingTimeouts {
    fn default() -> Self {
        Self {
            listing_load: Duration::from_secs(60),
            results: Duration::from_secs(15),
            product_page: Duration::from_secs(30),
            back_to_listing: Duration::from_secs(30),
        }
    }
}
