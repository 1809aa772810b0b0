// Pattern packs: per-style onset skeletons, one per role.
// true = strong hit suggested on that step, false = free for the generator.

use super::role::Role;

const PACK_LEN: usize = 16;

type Skeleton = [bool; PACK_LEN];

const fn hits(steps: &[usize]) -> Skeleton {
    let mut out = [false; PACK_LEN];
    let mut i = 0;
    while i < steps.len() {
        out[steps[i]] = true;
        i += 1;
    }
    out
}

const FOUR_FLOOR: Skeleton = hits(&[0, 4, 8, 12]);
const OFFBEAT: Skeleton = hits(&[2, 6, 10, 14]);
const EIGHTHS: Skeleton = hits(&[0, 2, 4, 6, 8, 10, 12, 14]);
const LEAD_ENTRIES: Skeleton = hits(&[1, 5, 9, 13]);

const PACKS: &[(&str, &[(Role, Skeleton)])] = &[
    (
        "dark_174",
        &[
            (Role::Kick, FOUR_FLOOR),
            (Role::Hats, OFFBEAT),
            (Role::Perc, hits(&[7, 15])),
            (Role::Bass, FOUR_FLOOR),
        ],
    ),
    (
        "makina_180",
        &[
            (Role::Kick, FOUR_FLOOR),
            (Role::Hats, EIGHTHS),
            (Role::Perc, hits(&[3, 7, 11, 15])),
            (Role::Bass, hits(&[0, 3, 4, 7, 8, 11, 12, 15])),
            (Role::Lead, LEAD_ENTRIES),
        ],
    ),
    (
        "industrial_172",
        &[
            (Role::Kick, hits(&[0, 4, 7, 8, 12, 15])),
            (Role::Hats, OFFBEAT),
            (Role::Perc, LEAD_ENTRIES),
            (Role::Bass, hits(&[0, 8])),
            (Role::Fx, hits(&[4, 12])),
        ],
    ),
];

/// Skeleton for (style, role), tiled or cut down to `steps`. None when the
/// style has nothing for this role, in which case the rules alone decide.
pub fn skeleton(style: &str, role: Role, steps: usize) -> Option<Vec<bool>> {
    if steps == 0 {
        return None;
    }
    let (_, roles) = PACKS.iter().find(|(name, _)| *name == style)?;
    let (_, base) = roles.iter().find(|(r, _)| *r == role)?;
    Some((0..steps).map(|i| base[i % PACK_LEN]).collect())
}

pub fn styles() -> impl Iterator<Item = &'static str> {
    PACKS.iter().map(|(name, _)| *name)
}
