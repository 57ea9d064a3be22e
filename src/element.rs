//! Element catalog for the cave grid.
//!
//! Every cell holds at most one [`Element`]: a kind tag plus the per-tick
//! state the engine tracks for it. All per-kind behavior flags live in a
//! static metadata table so the transition rules stay data driven.

/// Facing or movement direction on the grid. `None` is the neutral facing
/// carried by everything that does not steer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    None,
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Quarter turn counterclockwise. `None` stays `None`.
    pub fn rotate_left(self) -> Direction {
        match self {
            Direction::Up => Direction::Left,
            Direction::Left => Direction::Down,
            Direction::Down => Direction::Right,
            Direction::Right => Direction::Up,
            Direction::None => Direction::None,
        }
    }

    /// Quarter turn clockwise. `None` stays `None`.
    pub fn rotate_right(self) -> Direction {
        match self {
            Direction::Up => Direction::Right,
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
            Direction::None => Direction::None,
        }
    }

    /// Column and row offsets, with y growing downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::None => (0, 0),
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    fn index(self) -> usize {
        match self {
            Direction::None => 0,
            Direction::Up => 1,
            Direction::Down => 2,
            Direction::Left => 3,
            Direction::Right => 4,
        }
    }
}

/// How an element detonates when it is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplosionKind {
    None,
    ToSpace,
    ToDiamond,
}

/// Closed catalog of everything that can occupy a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Player,
    Space,
    Dirt,
    Boulder,
    Diamond,
    Bricks,
    Steel,
    Firefly,
    Butterfly,
    Explosion0,
    Explosion1,
    Explosion2,
    Explosion3,
    Explosion4,
    ExplosionToDiamond0,
    ExplosionToDiamond1,
    ExplosionToDiamond2,
    ExplosionToDiamond3,
    ExplosionToDiamond4,
}

/// Static per-kind metadata.
#[derive(Debug)]
pub struct KindMeta {
    /// Render glyphs indexed by facing (None, Up, Down, Left, Right).
    pub glyphs: [char; 5],
    /// Counts toward the settling diagnostics when it moves.
    pub important: bool,
    pub mob: bool,
    pub indestructible: bool,
    /// Objects resting on it can roll off sideways.
    pub rounded: bool,
    pub explosion: ExplosionKind,
    /// Facing a freshly created element starts with.
    pub start_facing: Direction,
}

const fn plain(glyph: char) -> KindMeta {
    KindMeta {
        glyphs: [glyph; 5],
        important: true,
        mob: false,
        indestructible: false,
        rounded: false,
        explosion: ExplosionKind::None,
        start_facing: Direction::None,
    }
}

const fn rounded(glyph: char) -> KindMeta {
    KindMeta {
        glyphs: [glyph; 5],
        important: true,
        mob: false,
        indestructible: false,
        rounded: true,
        explosion: ExplosionKind::None,
        start_facing: Direction::None,
    }
}

// Order matches the ElementKind declaration.
static METAS: [KindMeta; 19] = [
    KindMeta {
        glyphs: ['@'; 5],
        important: true,
        mob: false,
        indestructible: false,
        rounded: false,
        explosion: ExplosionKind::ToSpace,
        start_facing: Direction::None,
    },
    plain('.'),
    plain('*'),
    rounded('0'),
    rounded('d'),
    rounded('#'),
    KindMeta {
        glyphs: ['%'; 5],
        important: true,
        mob: false,
        indestructible: true,
        rounded: false,
        explosion: ExplosionKind::None,
        start_facing: Direction::None,
    },
    KindMeta {
        glyphs: ['<', '^', 'v', '<', '>'],
        important: false,
        mob: true,
        indestructible: false,
        rounded: false,
        explosion: ExplosionKind::ToDiamond,
        start_facing: Direction::Left,
    },
    KindMeta {
        glyphs: ['M', 'M', 'W', 'E', '3'],
        important: false,
        mob: true,
        indestructible: false,
        rounded: false,
        explosion: ExplosionKind::ToSpace,
        start_facing: Direction::Up,
    },
    plain('5'),
    plain('6'),
    plain('7'),
    plain('8'),
    plain('9'),
    plain('Y'),
    plain('U'),
    plain('I'),
    plain('P'),
    plain('T'),
];

impl ElementKind {
    pub fn meta(self) -> &'static KindMeta {
        &METAS[self as usize]
    }

    /// Glyph used for rendering and fingerprinting, per facing.
    pub fn symbol(self, facing: Direction) -> char {
        self.meta().glyphs[facing.index()]
    }

    pub fn important(self) -> bool {
        self.meta().important
    }

    pub fn mob(self) -> bool {
        self.meta().mob
    }

    pub fn indestructible(self) -> bool {
        self.meta().indestructible
    }

    pub fn rounded(self) -> bool {
        self.meta().rounded
    }

    pub fn explosion(self) -> ExplosionKind {
        self.meta().explosion
    }

    pub fn start_facing(self) -> Direction {
        self.meta().start_facing
    }

    /// Map a symbol to its kind. Unknown symbols map to Steel.
    pub fn from_symbol(chr: char) -> ElementKind {
        match chr {
            '@' => ElementKind::Player,
            '.' => ElementKind::Space,
            '*' => ElementKind::Dirt,
            '#' => ElementKind::Bricks,
            '0' => ElementKind::Boulder,
            'd' => ElementKind::Diamond,
            '%' => ElementKind::Steel,
            '^' | '<' | 'v' | '>' => ElementKind::Firefly,
            'M' | 'E' | 'W' | '3' => ElementKind::Butterfly,
            '5' => ElementKind::Explosion0,
            '6' => ElementKind::Explosion1,
            '7' => ElementKind::Explosion2,
            '8' => ElementKind::Explosion3,
            '9' => ElementKind::Explosion4,
            'Y' => ElementKind::ExplosionToDiamond0,
            'U' => ElementKind::ExplosionToDiamond1,
            'I' => ElementKind::ExplosionToDiamond2,
            'P' => ElementKind::ExplosionToDiamond3,
            'T' => ElementKind::ExplosionToDiamond4,
            _ => ElementKind::Steel,
        }
    }

    /// Facing encoded by a symbol, for the kinds that render per facing.
    pub fn facing_from_symbol(chr: char) -> Direction {
        match chr {
            '^' | 'M' => Direction::Up,
            '<' | 'E' => Direction::Left,
            'v' | 'W' => Direction::Down,
            '>' | '3' => Direction::Right,
            _ => Direction::None,
        }
    }

    /// Next stage of an explosion chain. The final stages resolve to the
    /// settled element the blast leaves behind.
    pub fn explosion_successor(self) -> Option<ElementKind> {
        match self {
            ElementKind::Explosion0 => Some(ElementKind::Explosion1),
            ElementKind::Explosion1 => Some(ElementKind::Explosion2),
            ElementKind::Explosion2 => Some(ElementKind::Explosion3),
            ElementKind::Explosion3 => Some(ElementKind::Explosion4),
            ElementKind::Explosion4 => Some(ElementKind::Space),
            ElementKind::ExplosionToDiamond0 => Some(ElementKind::ExplosionToDiamond1),
            ElementKind::ExplosionToDiamond1 => Some(ElementKind::ExplosionToDiamond2),
            ElementKind::ExplosionToDiamond2 => Some(ElementKind::ExplosionToDiamond3),
            ElementKind::ExplosionToDiamond3 => Some(ElementKind::ExplosionToDiamond4),
            ElementKind::ExplosionToDiamond4 => Some(ElementKind::Diamond),
            _ => None,
        }
    }
}

/// One occupied grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub kind: ElementKind,
    /// Set once the element has acted this tick.
    pub scanned: bool,
    /// Set while the element is dropping without interruption.
    pub falling: bool,
    pub facing: Direction,
}

impl Element {
    pub fn new(kind: ElementKind) -> Element {
        Element {
            kind,
            scanned: false,
            falling: false,
            facing: kind.start_facing(),
        }
    }

    pub fn with_facing(kind: ElementKind, facing: Direction) -> Element {
        Element {
            kind,
            scanned: false,
            falling: false,
            facing,
        }
    }

    /// Parse a symbol, picking up the facing it encodes.
    pub fn from_symbol(chr: char) -> Element {
        Element::with_facing(
            ElementKind::from_symbol(chr),
            ElementKind::facing_from_symbol(chr),
        )
    }

    pub fn symbol(&self) -> char {
        self.kind.symbol(self.facing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_rotations() {
        assert_eq!(Direction::Up.rotate_left(), Direction::Left);
        assert_eq!(Direction::Left.rotate_left(), Direction::Down);
        assert_eq!(Direction::Down.rotate_left(), Direction::Right);
        assert_eq!(Direction::Right.rotate_left(), Direction::Up);

        assert_eq!(Direction::Up.rotate_right(), Direction::Right);
        assert_eq!(Direction::Right.rotate_right(), Direction::Down);
        assert_eq!(Direction::Down.rotate_right(), Direction::Left);
        assert_eq!(Direction::Left.rotate_right(), Direction::Up);

        assert_eq!(Direction::None.rotate_left(), Direction::None);
        assert_eq!(Direction::None.rotate_right(), Direction::None);
    }

    #[test]
    fn test_symbol_round_trip() {
        for chr in "@.*0d#%^<v>MEW356789YUIPT".chars() {
            assert_eq!(Element::from_symbol(chr).symbol(), chr);
        }
    }

    #[test]
    fn test_unknown_symbol_degrades_to_steel() {
        assert_eq!(ElementKind::from_symbol('?'), ElementKind::Steel);
        assert_eq!(ElementKind::from_symbol('x'), ElementKind::Steel);
        assert_eq!(ElementKind::from_symbol(' '), ElementKind::Steel);
    }

    #[test]
    fn test_catalog_flags() {
        assert!(ElementKind::Boulder.rounded());
        assert!(ElementKind::Diamond.rounded());
        assert!(ElementKind::Bricks.rounded());
        assert!(ElementKind::Steel.indestructible());
        assert!(!ElementKind::Dirt.indestructible());

        assert!(ElementKind::Firefly.mob());
        assert!(!ElementKind::Firefly.important());
        assert_eq!(ElementKind::Firefly.explosion(), ExplosionKind::ToDiamond);
        assert_eq!(ElementKind::Firefly.start_facing(), Direction::Left);

        assert!(ElementKind::Butterfly.mob());
        assert_eq!(ElementKind::Butterfly.explosion(), ExplosionKind::ToSpace);
        assert_eq!(ElementKind::Butterfly.start_facing(), Direction::Up);

        assert_eq!(ElementKind::Player.explosion(), ExplosionKind::ToSpace);
        assert!(ElementKind::Boulder.important());
    }

    #[test]
    fn test_mob_facing_glyphs() {
        let firefly = Element::with_facing(ElementKind::Firefly, Direction::Up);
        assert_eq!(firefly.symbol(), '^');
        let butterfly = Element::with_facing(ElementKind::Butterfly, Direction::Right);
        assert_eq!(butterfly.symbol(), '3');
    }

    #[test]
    fn test_explosion_chain() {
        let mut kind = ElementKind::Explosion0;
        for expected in [
            ElementKind::Explosion1,
            ElementKind::Explosion2,
            ElementKind::Explosion3,
            ElementKind::Explosion4,
            ElementKind::Space,
        ] {
            kind = kind.explosion_successor().unwrap();
            assert_eq!(kind, expected);
        }
        assert_eq!(kind.explosion_successor(), None);

        let mut kind = ElementKind::ExplosionToDiamond0;
        for expected in [
            ElementKind::ExplosionToDiamond1,
            ElementKind::ExplosionToDiamond2,
            ElementKind::ExplosionToDiamond3,
            ElementKind::ExplosionToDiamond4,
            ElementKind::Diamond,
        ] {
            kind = kind.explosion_successor().unwrap();
            assert_eq!(kind, expected);
        }
        assert_eq!(ElementKind::Boulder.explosion_successor(), None);
    }
}
