use serde::{Deserialize, Serialize};

/// A gallery destination. The taxonomy is an ordered list and a destination's
/// position in it is what the matcher breaks ties on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub region: String,
    pub category: String,
}

impl Destination {
    pub fn new(name: &str, region: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            region: region.to_string(),
            category: category.to_string(),
        }
    }
}

const DEFAULT_TAXONOMY: [(&str, &str, &str); 39] = [
    ("Paris, France", "Europe", "Cities"),
    ("Rome, Italy", "Europe", "Historic Sites"),
    ("Dubai, UAE", "Middle East", "Cities"),
    ("Bali, Indonesia", "Asia", "Beaches"),
    ("Santorini, Greece", "Europe", "Resorts"),
    ("Tokyo, Japan", "Asia", "Cities"),
    ("Seoul, South Korea", "Asia", "Cities"),
    ("Singapore", "Asia", "Cities"),
    ("Doha, Qatar", "Middle East", "Cities"),
    ("Istanbul, Türkiye", "Middle East", "Historic Sites"),
    ("Cairo, Egypt", "Africa", "Historic Sites"),
    ("Cape Town, South Africa", "Africa", "Adventures"),
    ("Marrakesh, Morocco", "Africa", "Cultural"),
    ("Nairobi, Kenya", "Africa", "Adventures"),
    ("Reykjavik, Iceland", "Europe", "Adventures"),
    ("Oslo, Norway", "Europe", "Mountains"),
    ("Swiss Alps", "Europe", "Mountains"),
    ("Banff, Canada", "Americas", "Mountains"),
    ("New York City, USA", "Americas", "Cities"),
    ("Los Angeles, USA", "Americas", "Cities"),
    ("San Francisco, USA", "Americas", "Cities"),
    ("Rio de Janeiro, Brazil", "Americas", "Beaches"),
    ("Buenos Aires, Argentina", "Americas", "Cities"),
    ("Lima, Peru", "Americas", "Historic Sites"),
    ("Cancun, Mexico", "Americas", "Beaches"),
    ("Cartagena, Colombia", "Americas", "Cultural"),
    ("Sydney, Australia", "Oceania", "Cities"),
    ("Auckland, New Zealand", "Oceania", "Adventures"),
    ("Queenstown, New Zealand", "Oceania", "Adventures"),
    ("Maldives", "Asia", "Beaches"),
    ("Phuket, Thailand", "Asia", "Beaches"),
    ("Bora Bora, French Polynesia", "Oceania", "Resorts"),
    ("Sahara Desert", "Africa", "Adventures"),
    ("Petra, Jordan", "Middle East", "Historic Sites"),
    ("Zurich, Switzerland", "Europe", "Cities"),
    ("Vienna, Austria", "Europe", "Cities"),
    ("Prague, Czech Republic", "Europe", "Historic Sites"),
    ("Barcelona, Spain", "Europe", "Cities"),
    ("Lisbon, Portugal", "Europe", "Cities"),
];

/// The built-in travel taxonomy, in match-priority order.
pub fn default_destinations() -> Vec<Destination> {
    DEFAULT_TAXONOMY
        .iter()
        .map(|(name, region, category)| Destination::new(name, region, category))
        .collect()
}
