use edit_tree::EditTree;

fn show(tree: &EditTree<char>) {
    tree.assert_invariants();
    println!(
        "{:?} (len {}, height {}, rotations {})",
        tree.to_string(),
        tree.len(),
        tree.height(),
        tree.rotation_count()
    );
}

fn main() -> edit_tree::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::DEBUG.into()),
        )
        .init();

    let mut text = EditTree::new();
    for c in "editor".chars() {
        text.push(c);
    }
    show(&text);

    let removed = text.remove(2)?;
    println!("removed {removed:?}");
    show(&text);

    for (pos, c) in [(0, '['), (6, ']'), (3, 'i')] {
        text.insert(pos, c)?;
        show(&text);
    }

    let mut tail = text.split_off(4)?;
    show(&text);
    show(&tail);

    text.concatenate(&mut tail);
    show(&text);

    let cut = text.delete_range(1, 2)?;
    show(&cut);
    show(&text);

    println!("find \"to\": {:?}", text.find("to"));

    let mut graph = String::new();
    if text.dotgraph("text", &mut graph).is_ok() {
        println!("{graph}");
    }

    Ok(())
}
