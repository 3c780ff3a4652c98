use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Direction code persisted on a movement row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementType {
    Entree,
    Sortie,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entree => "ENTREE",
            MovementType::Sortie => "SORTIE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ENTREE" => Some(MovementType::Entree),
            "SORTIE" => Some(MovementType::Sortie),
            _ => None,
        }
    }
}

/// Fully-typed stock action a movement describes.
///
/// A transfer is persisted as a SORTIE row carrying a destination depot, but
/// in the domain layer the three actions are distinct variants, so an inbound
/// movement with a destination depot cannot be constructed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementKind {
    Entry { quantity: i64 },
    Exit { quantity: i64 },
    Transfer { quantity: i64, destination_depot_id: i32 },
}

impl MovementKind {
    pub fn quantity(&self) -> i64 {
        match *self {
            MovementKind::Entry { quantity }
            | MovementKind::Exit { quantity }
            | MovementKind::Transfer { quantity, .. } => quantity,
        }
    }

    pub fn movement_type(&self) -> MovementType {
        match self {
            MovementKind::Entry { .. } => MovementType::Entree,
            MovementKind::Exit { .. } | MovementKind::Transfer { .. } => MovementType::Sortie,
        }
    }

    pub fn destination_depot_id(&self) -> Option<i32> {
        match *self {
            MovementKind::Transfer {
                destination_depot_id,
                ..
            } => Some(destination_depot_id),
            _ => None,
        }
    }

    /// Reassembles the kind from the persisted column triple. `None` means
    /// the row carries an unknown type code or an ENTREE with a destination,
    /// neither of which this service ever writes.
    pub fn from_parts(
        movement_type: &str,
        quantity: i64,
        destination_depot_id: Option<i32>,
    ) -> Option<Self> {
        match (MovementType::from_str(movement_type)?, destination_depot_id) {
            (MovementType::Entree, None) => Some(MovementKind::Entry { quantity }),
            (MovementType::Entree, Some(_)) => None,
            (MovementType::Sortie, None) => Some(MovementKind::Exit { quantity }),
            (MovementType::Sortie, Some(destination)) => Some(MovementKind::Transfer {
                quantity,
                destination_depot_id: destination,
            }),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            MovementKind::Entry { .. } => "entry",
            MovementKind::Exit { .. } => "exit",
            MovementKind::Transfer { .. } => "transfer",
        }
    }
}

/// One ledger line: a stock entry, exit, or inter-depot transfer.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub material_id: i32,
    pub depot_id: i32,
    pub movement_type: String,
    pub quantity: i64,
    pub destination_depot_id: Option<i32>,
    pub reference_document: Option<String>,
    pub comment: Option<String>,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn kind(&self) -> Option<MovementKind> {
        MovementKind::from_parts(&self.movement_type, self.quantity, self.destination_depot_id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::MaterialId",
        to = "super::material::Column::Id"
    )]
    Material,
    #[sea_orm(
        belongs_to = "super::depot::Entity",
        from = "Column::DepotId",
        to = "super::depot::Column::Id"
    )]
    Depot,
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Material.def()
    }
}

impl Related<super::depot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Depot.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr> {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_round_trips_through_row_columns() {
        let kind = MovementKind::Transfer {
            quantity: 7,
            destination_depot_id: 3,
        };
        assert_eq!(kind.movement_type().as_str(), "SORTIE");
        assert_eq!(
            MovementKind::from_parts("SORTIE", 7, Some(3)),
            Some(kind)
        );
    }

    #[test]
    fn entree_with_destination_is_not_a_kind() {
        assert_eq!(MovementKind::from_parts("ENTREE", 5, Some(2)), None);
    }

    #[test]
    fn unknown_type_code_is_rejected() {
        assert_eq!(MovementKind::from_parts("RETOUR", 5, None), None);
    }
}
