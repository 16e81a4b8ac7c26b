use serde::{Deserialize, Serialize};

use crate::fetch::Fetcher;
use crate::predict::PredictError;

/// People currently aboard the target craft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AstronautRoster {
    pub count: usize,
    pub names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PeopleResponse {
    people: Vec<Person>,
}

#[derive(Debug, Deserialize)]
struct Person {
    name: String,
    craft: String,
}

pub fn fetch_roster(fetcher: &dyn Fetcher, url: &str, craft: &str) -> Result<AstronautRoster, PredictError> {
    log::debug!("Fetching {} crew from {}", craft, url);
    let body = fetcher.get_text(url)?;
    parse_roster(&body, craft)
}

/// Names aboard `craft`, in the order the source lists them.
pub fn parse_roster(body: &str, craft: &str) -> Result<AstronautRoster, PredictError> {
    let response: PeopleResponse = serde_json::from_str(body).map_err(|e| PredictError::Parse {
        name: "astronaut roster".into(),
        message: e.to_string(),
    })?;

    let names: Vec<String> = response
        .people
        .into_iter()
        .filter(|p| p.craft == craft)
        .map(|p| p.name)
        .collect();

    Ok(AstronautRoster {
        count: names.len(),
        names,
    })
}
