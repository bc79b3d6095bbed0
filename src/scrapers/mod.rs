pub mod baldor;
