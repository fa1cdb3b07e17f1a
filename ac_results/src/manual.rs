/*!

This is the long-form manual for `ac_results` and `acresults`.

## Pipeline

A run goes through the following stages:

1. **ingest**: every constituency page in the configured range is fetched and
   read. A page without candidates, a page that could not be fetched, or a page
   whose content cannot be read (missing vote count, unknown status) is
   skipped and the run continues with the next constituency. A constituency
   that does not have exactly one winner, or where two candidates share a
   name and a party, is also skipped.
   The candidates are joined with the district mapping and merged into the
   accumulated results file.
2. **analyze**: the party metrics and the margin buckets are recomputed from
   the whole accumulated results file.
3. **master**: the accumulated results, the margin buckets and the party
   metrics are joined into the master dataset.

The analyze and master stages always replace their output files.

## Accumulated results

The results file only grows. The key of a row is `(AC_NO, Candidate, Party)`.
When a constituency is fetched again, the rows already in the file are kept
as they are: a new vote count for a known candidate is ignored. Running the
same ingest twice leaves the file unchanged.

The file is written to a temporary file in the same directory and then
renamed over the previous version.

Columns: `AC_NO`, `AC_NAME`, `Candidate`, `Party`, `Votes`, `Margin`,
`Status`, `Total_Votes_Polled`, `DISTRICT`, `Total_Votes_Per_District`.

`AC_NAME` is stored title-cased. `DISTRICT` is empty when the constituency
could not be found in the district mapping, and so is
`Total_Votes_Per_District`. District totals never include those rows.

## District mapping

A CSV file with the columns `AC_NO`, `AC_NAME`, `DISTRICT`. The join uses the
id and the title-cased name: a page whose heading could not be read has an
empty name and does not get a district.

## Margin buckets

Only winners are classified. The buckets include their lower edge:

| Bucket   | Margin            | Indicator column |
|----------|-------------------|------------------|
| `<500`   | 0 to 499          | `<500`           |
| `0.5-2K` | 500 to 1 999      | `0.5-2K`         |
| `2-10K`  | 2 000 to 9 999    | `2_10K`          |
| `10-25K` | 10 000 to 24 999  | `10_25K`         |
| `25-50K` | 25 000 to 49 999  | `25_50K`         |
| `>50K`   | 50 000 and above  | `50K_plus`       |

The top bucket is closed by the largest winning margin in the file. This
edge changes as more constituencies are added.

A candidate printed without a margin has a margin of 0, and a winner in that
case is in the `<500` bucket. A winner whose margin could not be read, or is
negative, gets no bucket, and all the indicator columns are 0.

`Multi_Cornered_Count` is the number of candidates of the constituency who got
strictly more than 10% of the votes polled. It is 1 when nobody did.

## Party metrics

One row per party, by decreasing number of votes: `Party`, `Votes`,
`Vote_Share_%` (of all the votes in the file), `Constituencies_Contested`,
`Seats_Won`, `Conversion_Percentage` (seats won over constituencies contested,
rounded to 2 decimals).

## Master dataset

One row per accumulated result, with the margin bucket columns (empty for the
candidates who lost), the party metrics prefixed with `Party_`, and:

- `Vote_Percent`: share of the constituency vote, rounded to 2 decimals
- `Is_Multi_Cornered`: 1 when the multi-cornered count is 3 or more
- `Wasted_Votes`: the votes of a candidate who lost
- `Effective_Votes`: the votes of a winner
- `Votes_per_Seat`: party votes over party seats. Empty when the party won no
  seat.

The median vote percentage of the winners, and how many winners of each party
are below it, is printed at the end of the run. It is not part of the file.

*/
