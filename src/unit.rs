use crate::error::{AttributeError, AttributeKind};
use crate::map::ObservableMap;
use crate::node::{NodeId, ReactiveNode, Wiring};
use crate::signal::{ChangeSignal, Signal};
use crate::value::Observable;
use std::fmt;

/// The fixed attribute vocabulary every unit carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Maximum health, stored as `i32` under `"HP"`.
    MaxHealth,
    /// Maximum mana, stored as `i32` under `"MP"`.
    MaxMana,
    /// Damage per attack.
    AttackDamage,
    /// Attacks per second.
    AttackSpeed,
    /// Health regenerated per second.
    HealthRegen,
    /// Mana regenerated per second.
    ManaRegen,
}

impl Attribute {
    /// Every built-in attribute, in storage order.
    pub const ALL: [Attribute; 6] = [
        Attribute::MaxHealth,
        Attribute::MaxMana,
        Attribute::AttackDamage,
        Attribute::AttackSpeed,
        Attribute::HealthRegen,
        Attribute::ManaRegen,
    ];

    /// Key under which the attribute is stored.
    pub fn key(self) -> &'static str {
        match self {
            Attribute::MaxHealth => "HP",
            Attribute::MaxMana => "MP",
            Attribute::AttackDamage => "AttackDamage",
            Attribute::AttackSpeed => "AttackSpeed",
            Attribute::HealthRegen => "HPRegen",
            Attribute::ManaRegen => "MPRegen",
        }
    }

    /// Numeric type the attribute is stored as.
    pub fn kind(self) -> AttributeKind {
        match self {
            Attribute::MaxHealth | Attribute::MaxMana => AttributeKind::Int,
            _ => AttributeKind::Float,
        }
    }

    fn zeroed(self) -> AttributeCell {
        match self.kind() {
            AttributeKind::Int => AttributeCell::Int(Observable::new(0)),
            AttributeKind::Float => AttributeCell::Float(Observable::new(0.0)),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single attribute slot: an observable whole or fractional number.
#[derive(Clone, Debug)]
pub enum AttributeCell {
    /// Whole-number attribute.
    Int(Observable<i32>),
    /// Fractional attribute.
    Float(Observable<f32>),
}

impl AttributeCell {
    /// Numeric type of this cell.
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeCell::Int(_) => AttributeKind::Int,
            AttributeCell::Float(_) => AttributeKind::Float,
        }
    }

    /// Current value widened to `f64`.
    pub fn as_f64(&self) -> f64 {
        match self {
            AttributeCell::Int(v) => f64::from(v.get()),
            AttributeCell::Float(v) => f64::from(v.get()),
        }
    }
}

impl ReactiveNode for AttributeCell {
    fn node_id(&self) -> NodeId {
        match self {
            AttributeCell::Int(v) => v.node_id(),
            AttributeCell::Float(v) => v.node_id(),
        }
    }

    fn change_signal(&self) -> &ChangeSignal {
        match self {
            AttributeCell::Int(v) => v.change_signal(),
            AttributeCell::Float(v) => v.change_signal(),
        }
    }
}

/// Numeric types an [`AttributeCell`] can hold.
pub trait AttributeValue: Clone + PartialEq + Send + Sync + 'static {
    /// Tag of the matching cell variant.
    const KIND: AttributeKind;

    /// The cell's observable if it holds `Self`.
    fn from_cell(cell: &AttributeCell) -> Option<&Observable<Self>>;

    /// Wrap `value` in a fresh cell.
    fn into_cell(value: Self) -> AttributeCell;
}

impl AttributeValue for i32 {
    const KIND: AttributeKind = AttributeKind::Int;

    fn from_cell(cell: &AttributeCell) -> Option<&Observable<Self>> {
        match cell {
            AttributeCell::Int(v) => Some(v),
            AttributeCell::Float(_) => None,
        }
    }

    fn into_cell(value: Self) -> AttributeCell {
        AttributeCell::Int(Observable::new(value))
    }
}

impl AttributeValue for f32 {
    const KIND: AttributeKind = AttributeKind::Float;

    fn from_cell(cell: &AttributeCell) -> Option<&Observable<Self>> {
        match cell {
            AttributeCell::Float(v) => Some(v),
            AttributeCell::Int(_) => None,
        }
    }

    fn into_cell(value: Self) -> AttributeCell {
        AttributeCell::Float(Observable::new(value))
    }
}

/// Observable stats of a game unit.
///
/// Current health and mana are plain fields. Everything else lives in a
/// string-keyed attribute map seeded with [`Attribute::ALL`] (plus any custom
/// attributes given at construction); keys are never removed afterwards.
///
/// Any change, to the current values or to any attribute, fires this node's
/// change signal exactly once.
///
/// # Example
/// ```ignore
/// let unit = UnitAttributes::with_health(100.0, 100);
/// unit.change_signal().subscribe(|_| println!("unit changed"));
///
/// unit.current_hp().set(80.0);                 // prints once
/// unit.attack_speed()?.set(1.5);               // prints once
/// assert!(unit.attribute::<f32>("HP").is_err()); // HP is an int
/// ```
pub struct UnitAttributes {
    id: NodeId,
    change: ChangeSignal,
    current_hp: Observable<f32>,
    current_mp: Observable<f32>,
    attributes: ObservableMap<String, AttributeCell>,
    _wiring: Wiring,
}

impl UnitAttributes {
    /// Unit with every value at zero.
    pub fn new() -> Self {
        Self::assemble(seeded_attributes())
    }

    /// Unit starting at `current_hp` health out of `max_hp`.
    pub fn with_health(current_hp: f32, max_hp: i32) -> Self {
        let unit = Self::new();
        unit.current_hp.set(current_hp);
        if let Ok(max) = unit.max_hp() {
            max.set(max_hp);
        }
        unit
    }

    /// Unit with additional runtime-defined attributes.
    ///
    /// Fails if an extra name collides with a built-in or repeats.
    pub fn with_custom_attributes(
        extra: impl IntoIterator<Item = (String, AttributeCell)>,
    ) -> Result<Self, AttributeError> {
        let attributes = seeded_attributes();
        for (name, cell) in extra {
            if attributes.insert(name.clone(), cell).is_err() {
                return Err(AttributeError::Duplicate { name });
            }
        }
        Ok(Self::assemble(attributes))
    }

    fn assemble(attributes: ObservableMap<String, AttributeCell>) -> Self {
        let id = NodeId::next();
        let change = Signal::new();
        let current_hp = Observable::new(0.0);
        let current_mp = Observable::new(0.0);
        let wiring = Wiring::new(id, &change)
            .child(&current_hp)
            .child(&current_mp)
            .child(&attributes);

        Self {
            id,
            change,
            current_hp,
            current_mp,
            attributes,
            _wiring: wiring,
        }
    }

    /// Current health.
    pub fn current_hp(&self) -> &Observable<f32> {
        &self.current_hp
    }

    /// Current mana.
    pub fn current_mp(&self) -> &Observable<f32> {
        &self.current_mp
    }

    /// Maximum health.
    pub fn max_hp(&self) -> Result<Observable<i32>, AttributeError> {
        self.attribute(Attribute::MaxHealth.key())
    }

    /// Maximum mana.
    pub fn max_mp(&self) -> Result<Observable<i32>, AttributeError> {
        self.attribute(Attribute::MaxMana.key())
    }

    /// Damage per attack.
    pub fn attack_damage(&self) -> Result<Observable<f32>, AttributeError> {
        self.attribute(Attribute::AttackDamage.key())
    }

    /// Attacks per second.
    pub fn attack_speed(&self) -> Result<Observable<f32>, AttributeError> {
        self.attribute(Attribute::AttackSpeed.key())
    }

    /// Health regenerated per second.
    pub fn hp_regen(&self) -> Result<Observable<f32>, AttributeError> {
        self.attribute(Attribute::HealthRegen.key())
    }

    /// Mana regenerated per second.
    pub fn mp_regen(&self) -> Result<Observable<f32>, AttributeError> {
        self.attribute(Attribute::ManaRegen.key())
    }

    /// Attribute `name` as an observable of `T`.
    ///
    /// Fails with [`AttributeError::Unknown`] for a name that was never
    /// defined and [`AttributeError::TypeMismatch`] when the stored cell
    /// holds the other numeric type.
    pub fn attribute<T: AttributeValue>(&self, name: &str) -> Result<Observable<T>, AttributeError> {
        let cell = self
            .attributes
            .get(name)
            .ok_or_else(|| AttributeError::Unknown {
                name: name.to_string(),
            })?;

        T::from_cell(&cell)
            .cloned()
            .ok_or_else(|| AttributeError::TypeMismatch {
                name: name.to_string(),
                expected: T::KIND,
                actual: cell.kind(),
            })
    }

    /// The raw cell stored under `name`.
    pub fn attribute_cell(&self, name: &str) -> Option<AttributeCell> {
        self.attributes.get(name)
    }

    /// Names of every attribute, built-ins first.
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.keys()
    }
}

fn seeded_attributes() -> ObservableMap<String, AttributeCell> {
    let attributes = ObservableMap::new();
    for attribute in Attribute::ALL {
        attributes.set(attribute.key().to_string(), attribute.zeroed());
    }
    attributes
}

impl Default for UnitAttributes {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactiveNode for UnitAttributes {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn change_signal(&self) -> &ChangeSignal {
        &self.change
    }
}

impl fmt::Debug for UnitAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitAttributes")
            .field("id", &self.id)
            .field("current_hp", &self.current_hp.get())
            .field("current_mp", &self.current_mp.get())
            .field("attributes", &self.attributes.keys())
            .finish()
    }
}
