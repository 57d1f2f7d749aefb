use serde::{Deserialize, Serialize};

/// A named subscription tier.
///
/// Stored in the `profiles.plan` column as its lowercase key. Reads must
/// treat anything that does not parse as [`Plan::Free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Family,
    Legacy,
}

impl Plan {
    pub fn parse(key: &str) -> Option<Plan> {
        match key {
            "free" => Some(Plan::Free),
            "family" => Some(Plan::Family),
            "legacy" => Some(Plan::Legacy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Family => "family",
            Plan::Legacy => "legacy",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A countable resource cap. `Limited(1)` permits exactly one resource:
/// the limit is reached once `count >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Limited(u32),
    Unlimited,
}

impl Limit {
    pub fn reached(self, count: u64) -> bool {
        match self {
            Limit::Limited(n) => count >= u64::from(n),
            Limit::Unlimited => false,
        }
    }

    /// Whether the limit permits creating anything at all.
    pub fn allows_any(self) -> bool {
        match self {
            Limit::Limited(n) => n > 0,
            Limit::Unlimited => true,
        }
    }
}

/// A gated capability, countable or boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Tributes,
    Contributors,
    Memories,
    Slideshow,
    Export,
    AiPrompts,
    CustomThemes,
}

/// Countable resources compared against a plan's caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Tributes,
    Contributors,
    Memories,
}

#[derive(Debug, Clone)]
pub struct PlanLimits {
    pub tributes: Limit,
    pub contributors: Limit,
    pub memories: Limit,
    pub slideshow: bool,
    pub export: bool,
    pub ai_prompts: bool,
    pub custom_themes: bool,
}

impl PlanLimits {
    pub fn allows(&self, feature: Feature) -> bool {
        match feature {
            Feature::Tributes => self.tributes.allows_any(),
            Feature::Contributors => self.contributors.allows_any(),
            Feature::Memories => self.memories.allows_any(),
            Feature::Slideshow => self.slideshow,
            Feature::Export => self.export,
            Feature::AiPrompts => self.ai_prompts,
            Feature::CustomThemes => self.custom_themes,
        }
    }

    pub fn limit(&self, kind: ResourceKind) -> Limit {
        match kind {
            ResourceKind::Tributes => self.tributes,
            ResourceKind::Contributors => self.contributors,
            ResourceKind::Memories => self.memories,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanDefinition {
    pub name: &'static str,
    /// Stripe price for the tier. Always `None` for free, which must never
    /// be sent to Stripe as a purchasable item.
    pub price_id: Option<String>,
    pub limits: PlanLimits,
}

/// The fixed plan-to-limits table, built once at startup from the
/// configured Stripe price ids and injected into its consumers.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    free: PlanDefinition,
    family: PlanDefinition,
    legacy: PlanDefinition,
}

impl PlanCatalog {
    pub fn new(family_price_id: impl Into<String>, legacy_price_id: impl Into<String>) -> Self {
        // An empty price id means "not configured": the tier exists but is
        // not purchasable, same as the free tier's absent price.
        let family_price_id = Some(family_price_id.into()).filter(|s| !s.is_empty());
        let legacy_price_id = Some(legacy_price_id.into()).filter(|s| !s.is_empty());
        Self {
            free: PlanDefinition {
                name: "Free",
                price_id: None,
                limits: PlanLimits {
                    tributes: Limit::Limited(1),
                    contributors: Limit::Limited(5),
                    memories: Limit::Limited(50),
                    slideshow: false,
                    export: false,
                    ai_prompts: false,
                    custom_themes: false,
                },
            },
            family: PlanDefinition {
                name: "Family",
                price_id: family_price_id,
                limits: PlanLimits {
                    tributes: Limit::Limited(5),
                    contributors: Limit::Unlimited,
                    memories: Limit::Unlimited,
                    slideshow: true,
                    export: true,
                    ai_prompts: false,
                    custom_themes: false,
                },
            },
            legacy: PlanDefinition {
                name: "Legacy",
                price_id: legacy_price_id,
                limits: PlanLimits {
                    tributes: Limit::Unlimited,
                    contributors: Limit::Unlimited,
                    memories: Limit::Unlimited,
                    slideshow: true,
                    export: true,
                    ai_prompts: true,
                    custom_themes: true,
                },
            },
        }
    }

    pub fn definition(&self, plan: Plan) -> &PlanDefinition {
        match plan {
            Plan::Free => &self.free,
            Plan::Family => &self.family,
            Plan::Legacy => &self.legacy,
        }
    }

    pub fn limits(&self, plan: Plan) -> &PlanLimits {
        &self.definition(plan).limits
    }

    pub fn price_id(&self, plan: Plan) -> Option<&str> {
        self.definition(plan).price_id.as_deref()
    }

    /// Reverse lookup: which plan carries this Stripe price. `None` when no
    /// configured price matches.
    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        for plan in [Plan::Free, Plan::Family, Plan::Legacy] {
            if self.price_id(plan) == Some(price_id) {
                return Some(plan);
            }
        }
        None
    }

    /// Whether `plan_key` grants `feature`. An unrecognized key yields
    /// `false` for every feature.
    pub fn can_access(&self, plan_key: &str, feature: Feature) -> bool {
        match Plan::parse(plan_key) {
            Some(plan) => self.limits(plan).allows(feature),
            None => false,
        }
    }

    /// Whether `plan_key` has exhausted its cap on `kind` given the current
    /// resource count. An unrecognized key reports every limit as reached.
    pub fn has_reached_limit(&self, plan_key: &str, kind: ResourceKind, count: u64) -> bool {
        match Plan::parse(plan_key) {
            Some(plan) => self.limits(plan).limit(kind).reached(count),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PlanCatalog {
        PlanCatalog::new("price_family", "price_legacy")
    }

    const ALL_FEATURES: [Feature; 7] = [
        Feature::Tributes,
        Feature::Contributors,
        Feature::Memories,
        Feature::Slideshow,
        Feature::Export,
        Feature::AiPrompts,
        Feature::CustomThemes,
    ];

    #[test]
    fn plan_parse_round_trips_known_keys() {
        for plan in [Plan::Free, Plan::Family, Plan::Legacy] {
            assert_eq!(Plan::parse(plan.as_str()), Some(plan));
        }
        assert_eq!(Plan::parse("premium"), None);
        assert_eq!(Plan::parse(""), None);
        assert_eq!(Plan::parse("Free"), None);
    }

    #[test]
    fn plan_serializes_as_lowercase_key() {
        assert_eq!(serde_json::to_string(&Plan::Family).unwrap(), "\"family\"");
    }

    #[test]
    fn unknown_plan_fails_closed() {
        let catalog = catalog();
        for feature in ALL_FEATURES {
            assert!(!catalog.can_access("premium", feature));
        }
        for kind in [
            ResourceKind::Tributes,
            ResourceKind::Contributors,
            ResourceKind::Memories,
        ] {
            assert!(catalog.has_reached_limit("premium", kind, 0));
        }
    }

    #[test]
    fn free_plan_feature_access() {
        let catalog = catalog();
        assert!(catalog.can_access("free", Feature::Tributes));
        assert!(catalog.can_access("free", Feature::Memories));
        assert!(!catalog.can_access("free", Feature::Slideshow));
        assert!(!catalog.can_access("free", Feature::Export));
        assert!(!catalog.can_access("free", Feature::AiPrompts));
        assert!(!catalog.can_access("free", Feature::CustomThemes));
    }

    #[test]
    fn legacy_plan_grants_everything() {
        let catalog = catalog();
        for feature in ALL_FEATURES {
            assert!(catalog.can_access("legacy", feature));
        }
    }

    #[test]
    fn free_tribute_limit_is_exactly_one() {
        let catalog = catalog();
        assert!(!catalog.has_reached_limit("free", ResourceKind::Tributes, 0));
        assert!(catalog.has_reached_limit("free", ResourceKind::Tributes, 1));
        assert!(catalog.has_reached_limit("free", ResourceKind::Tributes, 2));
    }

    #[test]
    fn family_contributors_never_reached() {
        let catalog = catalog();
        for count in [0u64, 1, 500, u64::MAX] {
            assert!(!catalog.has_reached_limit("family", ResourceKind::Contributors, count));
        }
    }

    #[test]
    fn price_reverse_lookup() {
        let catalog = catalog();
        assert_eq!(catalog.plan_for_price("price_family"), Some(Plan::Family));
        assert_eq!(catalog.plan_for_price("price_legacy"), Some(Plan::Legacy));
        assert_eq!(catalog.plan_for_price("price_other"), None);
    }

    #[test]
    fn free_plan_has_no_price() {
        assert_eq!(catalog().price_id(Plan::Free), None);
    }
}
