mod bubble;
mod dendrogram;
mod interaction;
mod scatter;
