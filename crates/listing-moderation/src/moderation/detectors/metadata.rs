use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{AssetImage, Detector, DetectorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermFamily {
    Drugs,
    Pills,
    Paraphernalia,
    Alcohol,
    Weapons,
    Explicit,
    Fraud,
}

impl TermFamily {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Drugs => "drugs",
            Self::Pills => "pills",
            Self::Paraphernalia => "paraphernalia",
            Self::Alcohol => "alcohol",
            Self::Weapons => "weapons",
            Self::Explicit => "explicit",
            Self::Fraud => "fraud",
        }
    }
}

/// A group of filename terms sharing one severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconFamily {
    pub family: TermFamily,
    pub severity: f32,
    pub terms: Vec<String>,
}

/// Curated vocabulary matched against lower-cased file stems.
///
/// Very short or generic words that collide with ordinary product names (for example
/// `ron` inside `front`, or `tablet`) are deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilenameLexicon {
    pub families: Vec<LexiconFamily>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexiconMatch {
    pub family: TermFamily,
    pub term: String,
    pub severity: f32,
}

fn family(family: TermFamily, severity: f32, terms: &[&str]) -> LexiconFamily {
    LexiconFamily {
        family,
        severity,
        terms: terms.iter().map(|term| term.to_string()).collect(),
    }
}

impl Default for FilenameLexicon {
    fn default() -> Self {
        Self {
            families: vec![
                family(
                    TermFamily::Drugs,
                    0.9,
                    &[
                        "droga", "drug", "marihuana", "marijuana", "cannabis", "weed", "cogollo",
                        "ganja", "thc", "cbd", "porro", "hachis", "kush", "cocaina", "cocaine",
                        "heroina", "heroin", "metanfetamina", "methamphetamine", "anfetamina",
                        "mdma", "extasis", "ecstasy", "lsd", "fentanilo", "fentanyl", "mescalina",
                        "peyote",
                    ],
                ),
                family(
                    TermFamily::Weapons,
                    0.9,
                    &[
                        "gun", "weapon", "armas", "pistola", "revolver", "rifle", "fusil",
                        "escopeta", "ametralladora", "municion", "balas", "explosivo", "granada",
                        "dinamita", "polvora", "silenciador", "glock", "beretta", "uzi", "ak47",
                        "ar15", "knife", "cuchillo", "navaja", "machete", "puñal", "katana",
                    ],
                ),
                family(
                    TermFamily::Explicit,
                    0.9,
                    &[
                        "porn", "xxx", "nude", "naked", "nsfw", "desnud", "erotic", "escort",
                        "prostitut", "onlyfans", "camgirl", "fetiche", "bdsm", "sexual",
                    ],
                ),
                family(
                    TermFamily::Alcohol,
                    0.8,
                    &[
                        "alcohol", "cerveza", "beer", "whisky", "whiskey", "vodka", "tequila",
                        "licor", "brandy", "cognac", "champagne", "wine", "borrach", "drunk",
                        "mojito", "coctel", "cocktail", "chupito",
                    ],
                ),
                family(
                    TermFamily::Pills,
                    0.7,
                    &[
                        "pastilla", "pildora", "pills", "xanax", "valium", "diazepam",
                        "oxicodona", "oxycodone", "percocet", "vicodin", "morfina", "codeina",
                    ],
                ),
                family(
                    TermFamily::Paraphernalia,
                    0.6,
                    &["bong", "papel_fumar", "encendedor_especial"],
                ),
                family(
                    TermFamily::Fraud,
                    0.6,
                    &[
                        "robado", "robada", "falsificad", "counterfeit", "scam", "phishing",
                        "fraude", "estafa", "clonad", "pirata",
                    ],
                ),
            ],
        }
    }
}

impl FilenameLexicon {
    /// First family term contained in `stem`, scanning families in declaration order.
    pub fn first_match(&self, stem: &str) -> Option<LexiconMatch> {
        let stem = stem.to_lowercase();
        self.families.iter().find_map(|family| {
            family
                .terms
                .iter()
                .find(|term| !term.is_empty() && stem.contains(term.to_lowercase().as_str()))
                .map(|term| LexiconMatch {
                    family: family.family,
                    term: term.clone(),
                    severity: family.severity,
                })
        })
    }

    /// One match per family that has any term in `stem`.
    pub fn matches(&self, stem: &str) -> Vec<LexiconMatch> {
        let stem = stem.to_lowercase();
        self.families
            .iter()
            .filter_map(|family| {
                family
                    .terms
                    .iter()
                    .find(|term| !term.is_empty() && stem.contains(term.to_lowercase().as_str()))
                    .map(|term| LexiconMatch {
                        family: family.family,
                        term: term.clone(),
                        severity: family.severity,
                    })
            })
            .collect()
    }
}

/// Scores a file name by the severities of the term families it mentions.
#[derive(Debug, Clone)]
pub struct MetadataDetector {
    lexicon: Arc<FilenameLexicon>,
}

impl MetadataDetector {
    pub fn new(lexicon: Arc<FilenameLexicon>) -> Self {
        Self { lexicon }
    }
}

impl Detector for MetadataDetector {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn score(&self, image: &AssetImage<'_>) -> Result<f32, DetectorError> {
        let stem = match image.filename.rfind('.') {
            Some(index) if index > 0 => &image.filename[..index],
            _ => image.filename,
        };
        let total: f32 = self
            .lexicon
            .matches(stem)
            .iter()
            .map(|found| found.severity)
            .sum();
        Ok(total.min(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_product_names_do_not_match() {
        let lexicon = FilenameLexicon::default();
        for stem in [
            "iphone13_front",
            "tablet_samsung_side",
            "pillow_cover",
            "crackers_box",
            "ice_bucket",
            "bar_stool",
        ] {
            assert!(lexicon.first_match(stem).is_none(), "{stem} should be clean");
        }
    }

    #[test]
    fn reports_family_and_term() {
        let lexicon = FilenameLexicon::default();
        let found = lexicon.first_match("gun_for_sale").expect("match");
        assert_eq!(found.family, TermFamily::Weapons);
        assert_eq!(found.term, "gun");
        assert_eq!(found.severity, 0.9);
    }

    #[test]
    fn sums_family_severities_once_each() {
        let lexicon = FilenameLexicon::default();
        let matches = lexicon.matches("weed_and_beer_and_more_weed");
        assert_eq!(matches.len(), 2);
        let total: f32 = matches.iter().map(|m| m.severity).sum();
        assert!((total - 1.7).abs() < 1e-6);
    }
}
