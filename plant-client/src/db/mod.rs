pub mod plant_queries;
