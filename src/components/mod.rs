pub mod surface_view;
