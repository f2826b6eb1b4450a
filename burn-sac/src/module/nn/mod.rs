pub mod multi_layer_perceptron;
pub mod param_group;
pub mod target_model;
