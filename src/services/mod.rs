pub mod allocation;
pub mod audit;
pub mod consignments;
pub mod consoles;
pub mod documents;
pub mod sequences;
pub mod storage;
pub mod workflow;
