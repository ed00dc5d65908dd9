// data module
pub mod data {
    pub mod ids;
    pub mod mc_particle;
    pub mod hits;
    pub mod relation;
    pub mod reco;
    pub mod event;
}

// algorithm module
pub mod algorithm {
    pub mod kinematics;
}
