mod aggregates;
mod samples;
