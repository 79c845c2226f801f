mod fixtures;
mod run;
