pub mod osrm;
