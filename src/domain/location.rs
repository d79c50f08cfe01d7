use serde::Serialize;

/// Coarse origin metadata. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub ip: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
}

/// The part of a [`Location`] shown back to the person who signed up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationSummary {
    pub city: Option<String>,
    pub country: String,
}

impl Location {
    #[cfg(test)]
    pub fn is_unknown(&self) -> bool {
        *self == Self::default()
    }

    pub fn summary(&self) -> Option<LocationSummary> {
        self.country.as_ref().map(|country| LocationSummary {
            city: self.city.clone(),
            country: country.clone(),
        })
    }
}

impl LocationSummary {
    pub fn greeting(&self) -> String {
        match &self.city {
            Some(city) => format!("Greetings to {city}, {}!", self.country),
            None => format!("Greetings to {}!", self.country),
        }
    }
}
