// Copyright 2023 Remi Bernotavicius

use derive_more::Display;
use diesel::deserialize::Queryable;
use diesel::expression::Selectable;
use diesel::prelude::Insertable;
use diesel_derive_enum::DbEnum;
use diesel_derive_newtype::DieselNewType;
use strum::EnumIter;

/// One of the named sheets of the workbook.
#[derive(Debug, Display, EnumIter, Hash, Copy, Clone, PartialEq, Eq, DbEnum)]
pub enum Collection {
    #[display("Recipes")]
    Recipes,
    #[display("Ingredients")]
    Ingredients,
    #[display("Recipe_Ingredients")]
    RecipeIngredients,
    #[display("Meal_Plan")]
    MealPlan,
}

impl Collection {
    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }
}

/// 1-based row number inside a sheet, the way a spreadsheet counts them. Row 1 is the header.
#[derive(DieselNewType, Debug, Display, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct RowPosition(i32);

impl RowPosition {
    pub const HEADER: Self = Self(1);
    pub const FIRST_DATA: Self = Self(2);

    pub fn new(position: i32) -> Self {
        Self(position)
    }

    /// The position of the `index`th data row, skipping the header.
    pub fn for_index(index: usize) -> Self {
        Self(index as i32 + Self::FIRST_DATA.0)
    }

    pub fn get(&self) -> i32 {
        self.0
    }

    pub fn is_data(&self) -> bool {
        *self >= Self::FIRST_DATA
    }
}

#[derive(Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = crate::database::schema::cells)]
pub struct Cell {
    pub sheet: Collection,
    pub position: RowPosition,
    pub column_index: i32,
    pub value: String,
}
