use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Serializable form of the category policy table, loadable from settings files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTableDefinition {
    pub global_forbidden: Vec<String>,
    pub catch_all: String,
    pub categories: BTreeMap<String, CategoryPolicyDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPolicyDefinition {
    pub max_price: Decimal,
    pub min_description_length: usize,
    #[serde(default)]
    pub required_keywords: Vec<String>,
    #[serde(default)]
    pub forbidden_keywords: Vec<String>,
    #[serde(default)]
    pub suspicious_patterns: Vec<String>,
}

impl Default for PolicyTableDefinition {
    fn default() -> Self {
        Self::standard()
    }
}

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn category(
    max_price: i64,
    min_description_length: usize,
    required: &[&str],
    forbidden: &[&str],
    patterns: &[&str],
) -> CategoryPolicyDefinition {
    CategoryPolicyDefinition {
        max_price: Decimal::from(max_price),
        min_description_length,
        required_keywords: words(required),
        forbidden_keywords: words(forbidden),
        suspicious_patterns: words(patterns),
    }
}

impl PolicyTableDefinition {
    /// Marketplace table with the seventeen storefront categories and the `Varios` catch-all.
    pub fn standard() -> Self {
        let global_forbidden = words(&[
            // drugs
            "droga", "cocaina", "heroina", "marihuana", "cannabis", "lsd", "mdma", "ecstasy",
            "metanfetamina", "crack", "anfetamina", "opio", "morfina", "fentanilo",
            // weapons and explosives
            "pistola", "revolver", "rifle", "escopeta", "ametralladora", "bomba", "explosivo",
            "granada", "dinamita", "balas", "municion", "cuchillo de combate",
            // sexual services
            "prostitucion", "escort", "acompañante sexual", "masaje erotico", "contenido adulto",
            "webcam adulto", "servicio sexual",
            // forged documents and fraud
            "cedula falsa", "pasaporte falso", "titulo falso", "diploma falso", "licencia falsa",
            "tarjeta credito clonada", "dinero falso", "billetes falsos",
            // other illegal activity
            "hacking", "pirateo", "software pirata", "cuenta robada", "tarjeta robada",
            "lavado de dinero", "blanqueo", "estafa piramidal",
        ]);

        let mut categories = BTreeMap::new();
        categories.insert(
            "Arriendos".to_string(),
            category(
                2_000_000,
                50,
                &["arriendo", "alquiler", "renta", "habitacion", "departamento", "casa", "pieza"],
                &["prostitucion", "escort", "por horas"],
                &[r"solo\s+mujeres?\s+jovenes?", r"sin\s+preguntas", r"discrecion\s+absoluta"],
            ),
        );
        categories.insert(
            "Artes y Manualidades".to_string(),
            category(
                500_000,
                30,
                &["arte", "manualidad", "creativo", "hecho a mano", "handmade", "artesania"],
                &["replica", "copia", "falsificacion"],
                &[r"copia\s+exacta", r"indistinguible\s+del\s+original"],
            ),
        );
        categories.insert(
            "Cafetería y Snacks".to_string(),
            category(
                50_000,
                20,
                &["cafe", "snack", "comida", "bebida", "dulce", "salado", "reposteria"],
                &["vencido", "caducado", "sin registro sanitario", "casero sin permiso"],
                &[r"sin\s+fecha\s+vencimiento", r"preparado\s+en\s+casa\s+sin"],
            ),
        );
        categories.insert(
            "Deportes y Outdoor".to_string(),
            category(
                1_000_000,
                30,
                &["deporte", "ejercicio", "outdoor", "aventura", "fitness", "entrenamiento"],
                &["esteroides", "dopaje", "sustancia prohibida"],
                &[r"mejora\s+rendimiento\s+garantizado", r"sustancia\s+para\s+deportistas"],
            ),
        );
        categories.insert(
            "Electrodomésticos".to_string(),
            category(
                2_000_000,
                40,
                &["electrodomestico", "cocina", "lavadora", "refrigerador", "horno", "electronico"],
                &["robado", "sin boleta", "origen dudoso"],
                &[r"sin\s+garantia\s+ni\s+boleta", r"conseguido\s+de\s+manera"],
            ),
        );
        categories.insert(
            "Entradas y Eventos".to_string(),
            category(
                500_000,
                25,
                &["entrada", "ticket", "evento", "concierto", "show", "espectaculo"],
                &["falsa", "clonada", "duplicada"],
                &[r"garantizado\s+ingreso\s+sin", r"entrada\s+sin\s+validar"],
            ),
        );
        categories.insert(
            "Hogar y Dormitorio".to_string(),
            category(
                1_000_000,
                30,
                &["hogar", "casa", "dormitorio", "mueble", "decoracion", "habitacion"],
                &["usado sin lavar", "con manchas permanentes", "infestado"],
                &[r"sin\s+limpiar\s+desde", r"manchas\s+que\s+no\s+salen"],
            ),
        );
        categories.insert(
            "Relojes y Joyas".to_string(),
            category(
                5_000_000,
                40,
                &["reloj", "joya", "oro", "plata", "diamante", "accesorio"],
                &["replica", "copia", "falso", "imitacion", "robado"],
                &[r"parece\s+original", r"indistinguible\s+del\s+real", r"rolex\s+barato"],
            ),
        );
        categories.insert(
            "Instrumentos Musicales".to_string(),
            category(
                3_000_000,
                35,
                &["instrumento", "musical", "musica", "guitarra", "piano", "bateria"],
                &["robado", "sin papeles", "dudosa procedencia"],
                &[r"sin\s+certificado\s+de\s+origen", r"conseguido\s+de\s+forma"],
            ),
        );
        categories.insert(
            "Juegos y Entretenimiento".to_string(),
            category(
                800_000,
                25,
                &["juego", "entretenimiento", "diversión", "consola", "videojuego", "juguete"],
                &["pirata", "crackeado", "modificado ilegalmente", "cuenta robada"],
                &[r"juegos\s+gratis\s+para\s+siempre", r"cuenta\s+con\s+todos\s+los\s+juegos"],
            ),
        );
        categories.insert(
            "Libros, película y música".to_string(),
            category(
                200_000,
                25,
                &["libro", "pelicula", "musica", "dvd", "cd", "blu-ray", "lectura"],
                &["pirata", "copia ilegal", "descarga ilegal", "torrent"],
                &[r"copia\s+digital\s+gratis", r"descarga\s+desde\s+mi\s+servidor"],
            ),
        );
        categories.insert(
            "Mascotas".to_string(),
            category(
                1_000_000,
                40,
                &["mascota", "perro", "gato", "animal", "cachorro", "gatito"],
                &["maltratado", "enfermo sin tratar", "sin vacunas", "robado"],
                &[r"sin\s+papeles\s+veterinarios", r"encontrado\s+en\s+la\s+calle\s+ayer"],
            ),
        );
        categories.insert(
            "Ropa y Accesorios".to_string(),
            category(
                500_000,
                25,
                &["ropa", "vestimenta", "accesorio", "zapato", "bolso", "prenda"],
                &["replica", "copia", "falso", "imitacion"],
                &[r"parece\s+marca\s+original", r"nike\s+barato\s+desde\s+china"],
            ),
        );
        categories.insert(
            "Servicios Estudiantiles".to_string(),
            category(
                200_000,
                30,
                &["servicio", "estudiante", "estudio", "tarea", "proyecto", "academico"],
                &["hago tareas por ti", "examen por ti", "titulo falso", "plagio garantizado"],
                &[
                    r"hago\s+tu\s+tesis\s+completa",
                    r"examen\s+online\s+por\s+ti",
                    r"plagio\s+no\s+detectable",
                ],
            ),
        );
        categories.insert(
            "Tecnología".to_string(),
            category(
                3_000_000,
                35,
                &[
                    "tecnologia", "electronico", "computador", "celular", "smartphone", "tablet",
                    "iphone", "samsung", "laptop", "pc", "mac", "android",
                ],
                &["robado", "bloqueado", "sin imei", "reportado", "clonado"],
                &[r"sin\s+caja\s+ni\s+papeles", r"bloqueado\s+pero\s+se\s+puede", r"imei\s+cambiado"],
            ),
        );
        categories.insert(
            "Vehículos".to_string(),
            category(
                50_000_000,
                50,
                &["vehiculo", "auto", "carro", "moto", "bicicleta", "transporte"],
                &["sin papeles", "chocado grave", "inundado", "robado"],
                &[
                    r"papeles\s+en\s+tramite\s+hace\s+años",
                    r"motor\s+fundido\s+pero",
                    r"sin\s+revision\s+tecnica\s+desde",
                ],
            ),
        );
        categories.insert(
            "Varios".to_string(),
            category(
                10_000_000,
                20,
                &[],
                &[],
                &[r"producto\s+misterioso", r"no\s+puedo\s+decir\s+que\s+es"],
            ),
        );

        Self {
            global_forbidden,
            catch_all: "Varios".to_string(),
            categories,
        }
    }
}

/// Compiled per-category rule set.
#[derive(Debug, Clone)]
pub struct CategoryPolicy {
    pub name: String,
    pub max_price: Decimal,
    pub min_description_length: usize,
    pub required_keywords: Vec<String>,
    pub forbidden_keywords: Vec<String>,
    pub suspicious_patterns: Vec<Regex>,
}

/// Lookup table resolving category names to policies, with a catch-all fallback.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    global_forbidden: Vec<String>,
    catch_all_key: String,
    catch_all: CategoryPolicy,
    policies: BTreeMap<String, CategoryPolicy>,
}

impl PolicyTable {
    pub fn standard() -> Result<Self, PolicyError> {
        Self::from_definition(&PolicyTableDefinition::standard())
    }

    pub fn from_definition(definition: &PolicyTableDefinition) -> Result<Self, PolicyError> {
        let mut policies = BTreeMap::new();
        for (name, rules) in &definition.categories {
            let key = lookup_key(name);
            if key.is_empty() {
                return Err(PolicyError::EmptyCategoryName);
            }
            if rules.max_price.is_sign_negative() {
                return Err(PolicyError::NegativeCeiling(name.clone()));
            }
            let policy = compile(name, rules)?;
            if policies.insert(key, policy).is_some() {
                return Err(PolicyError::DuplicateCategory(name.clone()));
            }
        }

        let catch_all_key = lookup_key(&definition.catch_all);
        let catch_all = policies
            .remove(&catch_all_key)
            .ok_or_else(|| PolicyError::MissingCatchAll(definition.catch_all.clone()))?;

        Ok(Self {
            global_forbidden: normalize_terms(&definition.global_forbidden),
            catch_all_key,
            catch_all,
            policies,
        })
    }

    /// Resolves a listing's category, falling back to the catch-all for unknown or
    /// missing names.
    pub fn resolve(&self, category: Option<&str>) -> &CategoryPolicy {
        let Some(name) = category else {
            return &self.catch_all;
        };
        let key = lookup_key(name);
        if key == self.catch_all_key {
            return &self.catch_all;
        }
        self.policies.get(&key).unwrap_or(&self.catch_all)
    }

    pub fn global_forbidden(&self) -> &[String] {
        &self.global_forbidden
    }

    pub fn catch_all(&self) -> &CategoryPolicy {
        &self.catch_all
    }

    /// Every policy in name order, catch-all last.
    pub fn policies(&self) -> impl Iterator<Item = &CategoryPolicy> {
        self.policies
            .values()
            .chain(std::iter::once(&self.catch_all))
    }
}

fn lookup_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn normalize_terms(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty())
        .collect()
}

fn compile(name: &str, rules: &CategoryPolicyDefinition) -> Result<CategoryPolicy, PolicyError> {
    let suspicious_patterns = rules
        .suspicious_patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| PolicyError::InvalidPattern {
                    category: name.to_string(),
                    pattern: pattern.clone(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CategoryPolicy {
        name: name.trim().to_string(),
        max_price: rules.max_price,
        min_description_length: rules.min_description_length,
        required_keywords: normalize_terms(&rules.required_keywords),
        forbidden_keywords: normalize_terms(&rules.forbidden_keywords),
        suspicious_patterns,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("category names must not be blank")]
    EmptyCategoryName,
    #[error("category '{0}' is defined more than once")]
    DuplicateCategory(String),
    #[error("catch-all category '{0}' has no policy")]
    MissingCatchAll(String),
    #[error("category '{0}' has a negative price ceiling")]
    NegativeCeiling(String),
    #[error("category '{category}' has an invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        category: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
