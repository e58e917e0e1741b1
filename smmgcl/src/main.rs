mod embed_common;
mod fit_smmgcl;
mod smmgcl_input;

#[cfg(test)]
mod test_fixtures;

use embed_common::*;
use fit_smmgcl::*;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "SMMGCL",
    long_about = "Spatial Multi-omics Multi-view Graph Contrastive Learning\n\
		  Each dataset directory holds `adata_omics1.h5ad`, `adata_omics2.h5ad`\n\
		  and the neighbourhood graphs `0_graph_dict.h5`, `1_graph_dict.h5`."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Train SMMGCL and cluster spots",
        long_about = "Train a multi-view graph convolutional model in the three stages: \n\
		      (1) Encode each omics view over its spatial graph\n\
		      (2) Fuse the view embeddings and train with reconstruction,\n\
		          contrastive and consistency losses\n\
		      (3) Cluster the fused embedding by k-means.\n"
    )]
    Train(TrainArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Train(args) => {
            fit_smmgcl(args)?;
        }
    }

    info!("Done");
    Ok(())
}
