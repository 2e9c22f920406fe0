use sw_reconstruct::{
    Aligner, AlignerParameters, GapPenalties, Scorer, Sequence, SubstitutionMatrix, TracebackOperation,
};

fn render(ops: &[TracebackOperation]) -> String {
    let mut cigar = String::new();
    let mut run: Option<(char, usize)> = None;
    for op in ops {
        let code = match op {
            TracebackOperation::Match => '=',
            TracebackOperation::Mismatch => 'X',
            TracebackOperation::Insertion => 'I',
            TracebackOperation::Deletion => 'D',
        };
        run = match run {
            Some((c, n)) if c == code => Some((c, n + 1)),
            Some((c, n)) => {
                cigar.push_str(&format!("{}{}", n, c));
                Some((code, 1))
            }
            None => Some((code, 1)),
        };
    }
    if let Some((c, n)) = run {
        cigar.push_str(&format!("{}{}", n, c));
    }
    cigar
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let params = AlignerParameters::new()
        .with_lane_groups(4)?
        .with_base_case_rows(4)?;
    let aligner = Aligner::new(params)?;

    let seq0 = Sequence::new(b"TTGACACACACTAGGCATTACGATCGGACCT");
    let seq1 = Sequence::new(b"CCAGCACACAGCATTTACGATCGCC");

    let dna = Scorer::simple(2, -1, GapPenalties::new(2, 1)?);
    match aligner.align(&seq0, &seq1, &dna) {
        Ok(result) => {
            let ops = result.operations(seq0.as_bytes(), seq1.as_bytes());
            let stats = result.statistics(seq0.as_bytes(), seq1.as_bytes());
            println!(
                "DNA: score {} from ({}, {}) to ({}, {}), {} ({} matches, {} gaps)",
                result.score,
                result.start.i,
                result.start.j,
                result.end.i,
                result.end.j,
                render(&ops),
                stats.matches,
                stats.gaps
            );
            println!(
                "  {} splits, {} base cases, peak {} bytes",
                result.stats.splits, result.stats.base_cases, result.stats.peak_device_memory
            );
        }
        Err(err) if err.is_no_alignment() => println!("DNA: {}", err),
        Err(err) => return Err(err.into()),
    }

    let protein = Scorer::matrix(SubstitutionMatrix::blosum62(), GapPenalties::new(11, 1)?);
    let prot0 = Sequence::from("MKTAYIAKQRQISFVKSHFSRQLEERLGLIEVQ");
    let prot1 = Sequence::from("MKTAYIAKQRQISFVKSHFSRQDILDLWIYHTQ");
    let result = aligner.align(&prot0, &prot1, &protein)?;
    println!(
        "Protein: score {} over {} columns, {}",
        result.score,
        result.len(),
        render(&result.operations(prot0.as_bytes(), prot1.as_bytes()))
    );

    Ok(())
}
