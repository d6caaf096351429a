pub mod arithmetic;
pub mod boolean;
pub mod collection;
pub mod comparison;
pub mod in_list;
pub mod is_null;
pub mod like;
pub mod logical;
pub mod object;
