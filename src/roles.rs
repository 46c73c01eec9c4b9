//! Cast templates for new productions.
//!
//! Every production gets a conductor role plus a cast picked by title
//! keyword. Titles matching no keyword get a generic four-part cast.
//!
//! Role identities are `<production_id>_<suffix>`, so seeding is idempotent:
//! roles that already exist are left alone.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::LedgerResult;
use crate::models::{Entity, EntityDraft, Production, Role, RoleDraft};
use crate::store::EntityStore;

/// One role of a cast template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleTemplate {
    pub suffix: &'static str,
    pub name: &'static str,
    pub is_conductor: bool,
}

const fn part(suffix: &'static str, name: &'static str) -> RoleTemplate {
    RoleTemplate {
        suffix,
        name,
        is_conductor: false,
    }
}

const CONDUCTOR: RoleTemplate = RoleTemplate {
    suffix: "conductor",
    name: "Дирижер",
    is_conductor: true,
};

const GENERIC_CAST: &[RoleTemplate] = &[
    part("lead_male", "Главная мужская роль"),
    part("lead_female", "Главная женская роль"),
    part("supporting_male", "Второстепенная мужская роль"),
    part("supporting_female", "Второстепенная женская роль"),
];

/// Title keywords (lowercase, any of) and the cast they select.
/// First match wins.
const CASTS: &[(&[&str], &[RoleTemplate])] = &[
    (
        &["щелкунчик", "nutcracker"],
        &[
            part("clara", "Клара"),
            part("prince", "Принц"),
            part("drosselmeyer", "Дроссельмейер"),
            part("mouse_king", "Мышиный король"),
            part("sugar_plum", "Фея Драже"),
        ],
    ),
    (
        &["аида", "aida"],
        &[
            part("aida", "Аида"),
            part("radames", "Радамес"),
            part("amneris", "Амнерис"),
            part("amonasro", "Амонасро"),
            part("ramfis", "Рамфис"),
        ],
    ),
    (
        &["лебединое", "swan"],
        &[
            part("odette", "Одетта"),
            part("odile", "Одиллия"),
            part("prince_siegfried", "Принц Зигфрид"),
            part("rothbart", "Ротбарт"),
        ],
    ),
    (
        &["онегин", "onegin"],
        &[
            part("onegin", "Онегин"),
            part("tatiana", "Татьяна"),
            part("lenski", "Ленский"),
            part("olga", "Ольга"),
            part("gremin", "Гремин"),
        ],
    ),
    (
        &["кармен", "carmen"],
        &[
            part("carmen", "Кармен"),
            part("don_jose", "Дон Хосе"),
            part("escamillo", "Эскамильо"),
            part("micaela", "Микаэла"),
        ],
    ),
    (
        &["спящая", "sleeping"],
        &[
            part("aurora", "Аврора"),
            part("prince_desire", "Принц Дезире"),
            part("lilac_fairy", "Фея Сирени"),
            part("carabosse", "Карабосс"),
        ],
    ),
    (
        &["риголетто", "rigoletto"],
        &[
            part("rigoletto", "Риголетто"),
            part("gilda", "Джильда"),
            part("duke", "Герцог Мантуанский"),
            part("sparafucile", "Спарафучиле"),
        ],
    ),
    (
        &["жизель", "giselle"],
        &[
            part("giselle", "Жизель"),
            part("albrecht", "Альбрехт"),
            part("hilarion", "Гиларион"),
            part("myrtha", "Мирта"),
        ],
    ),
    (
        &["ромео", "джульетта", "romeo"],
        &[
            part("romeo", "Ромео"),
            part("juliet", "Джульетта"),
            part("mercutio", "Меркуцио"),
            part("tybalt", "Тибальт"),
        ],
    ),
    (
        &["иоланта", "iolanta"],
        &[
            part("iolanta", "Иоланта"),
            part("vaudemont", "Водемон"),
            part("king", "Король Рене"),
            part("robert", "Роберт"),
        ],
    ),
];

/// Cast template for a production title, conductor first.
pub fn template_for(title: &str) -> Vec<RoleTemplate> {
    let title = title.to_lowercase();
    let cast = CASTS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| title.contains(*k)))
        .map_or(GENERIC_CAST, |(_, cast)| *cast);

    std::iter::once(CONDUCTOR).chain(cast.iter().copied()).collect()
}

/// Role drafts for one production. An empty title falls back to the id.
pub fn drafts_for(production: &Production) -> Vec<RoleDraft> {
    let title = if production.title.trim().is_empty() {
        production.id.as_str()
    } else {
        production.title.as_str()
    };
    template_for(title)
        .into_iter()
        .map(|t| {
            let draft = RoleDraft::new(t.name)
                .with_id(format!("{}_{}", production.id, t.suffix))
                .for_production(&production.id);
            if t.is_conductor {
                draft.conductor()
            } else {
                draft
            }
        })
        .collect()
}

/// Creates the template roles every production is missing.
///
/// When two productions generate the same role id, the first production
/// keeps it. Every draft is checked before the first role is written.
/// Returns the roles created, in production order.
pub fn seed_missing_roles(store: &mut EntityStore) -> LedgerResult<Vec<Role>> {
    let mut claimed = HashSet::new();
    let mut drafts: Vec<RoleDraft> = Vec::new();
    for draft in store.productions().iter().flat_map(drafts_for) {
        let Some(id) = draft.id.clone() else { continue };
        if store.role(&id).is_some() {
            continue;
        }
        if !claimed.insert(id.clone()) {
            warn!(role = %id, "template role id generated twice; keeping the first");
            continue;
        }
        drafts.push(draft);
    }

    let drafts: Vec<EntityDraft> = drafts.into_iter().map(EntityDraft::from).collect();
    for draft in &drafts {
        store.check_draft(draft)?;
    }

    let mut created = Vec::with_capacity(drafts.len());
    for draft in drafts {
        if let Entity::Role(role) = store.create(draft)? {
            debug!(role = %role.id, "role seeded");
            created.push(role);
        }
    }
    info!(roles = created.len(), "missing roles seeded");
    Ok(created)
}
